use std::future::Future;

use anyhow::Context;
use postgrest::Postgrest;
use schema::{
    Field, Question, QuestionFilter, QuestionId, QuestionUpdate,
    db::{CREATED_AT, ID, KEYWORD_COLUMNS, QUESTIONS_TABLE, UNIQUE_ID},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

/// The remote `questions` table.
pub trait QuestionStore {
    /// Cheap round trip used to report connection status.
    fn ping(&self) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Rows `from..=to` in table order.
    fn fetch_page(
        &self,
        from: usize,
        to: usize,
    ) -> impl Future<Output = anyhow::Result<Vec<Question>>> + Send;

    /// The generation pool: at most `filter.limit` rows, newest first.
    fn list(
        &self,
        filter: &QuestionFilter,
    ) -> impl Future<Output = anyhow::Result<Vec<Question>>> + Send;

    fn insert(&self, batch: &[Question]) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn update(
        &self,
        id: &QuestionId,
        update: &QuestionUpdate,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn find_by_unique_id(
        &self,
        unique_id: &str,
    ) -> impl Future<Output = anyhow::Result<Option<Question>>> + Send;

    /// Sorted, trimmed, distinct non-blank values of a column.
    fn distinct(&self, field: Field) -> impl Future<Output = anyhow::Result<Vec<String>>> + Send;
}

/// Reads the whole table, `page_size` rows at a time, until a short page.
#[instrument(skip(store))]
pub async fn fetch_all<S: QuestionStore>(store: &S, page_size: usize) -> anyhow::Result<Vec<Question>> {
    let page_size = page_size.max(1);
    let mut rows = vec![];
    let mut from = 0;
    loop {
        let page = store
            .fetch_page(from, from + page_size - 1)
            .await
            .with_context(|| format!("unable to fetch questions {from}..{}", from + page_size))?;
        let len = page.len();
        rows.extend(page);
        if len < page_size {
            break;
        }
        from += page_size;
    }
    debug!(rows = rows.len(), "fetched question corpus");
    Ok(rows)
}

/// `column.ilike.%keyword%` conditions for every keyword and searched column.
pub fn keyword_conditions(filter: &QuestionFilter) -> Option<String> {
    let keywords = filter.keyword_list();
    if keywords.is_empty() {
        return None;
    }
    let conditions: Vec<String> = keywords
        .iter()
        .flat_map(|keyword| {
            KEYWORD_COLUMNS
                .iter()
                .map(move |column| format!("{column}.ilike.%{keyword}%"))
        })
        .collect();
    Some(conditions.join(","))
}

/// Trims, drops blanks, sorts and de-duplicates column values.
pub fn distinct_values<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut values: Vec<String> = values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    values.sort();
    values.dedup();
    values
}

/// [`QuestionStore`] backed by the Supabase PostgREST endpoint.
#[derive(Clone)]
pub struct SupabaseStore {
    client: Postgrest,
}

impl SupabaseStore {
    pub fn new(supabase_url: &str, supabase_key: &str) -> Self {
        let client = Postgrest::new(format!("{}/rest/v1", supabase_url.trim_end_matches('/')))
            .insert_header("apikey", supabase_key)
            .insert_header("Authorization", format!("Bearer {supabase_key}"));
        Self { client }
    }

    fn questions(&self) -> postgrest::Builder {
        self.client.from(QUESTIONS_TABLE)
    }
}

async fn rows<T: DeserializeOwned>(builder: postgrest::Builder) -> anyhow::Result<Vec<T>> {
    let res = builder.execute().await?.error_for_status()?;
    let text = res.text().await?;
    let rows = serde_json::from_str(&text).context("unable to deserialize store response")?;
    Ok(rows)
}

async fn write(builder: postgrest::Builder) -> anyhow::Result<()> {
    let res = builder.execute().await?;
    let status = res.status();
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        anyhow::bail!("store responded {status}: {text}");
    }
    Ok(())
}

impl QuestionStore for SupabaseStore {
    #[instrument(skip_all, err(Debug))]
    async fn ping(&self) -> anyhow::Result<()> {
        let _: Vec<Value> = rows(self.questions().select(ID).limit(1))
            .await
            .context("unable to reach question store")?;
        Ok(())
    }

    #[instrument(skip(self), err(Debug))]
    async fn fetch_page(&self, from: usize, to: usize) -> anyhow::Result<Vec<Question>> {
        rows(self.questions().select("*").range(from, to)).await
    }

    #[instrument(skip_all, err(Debug))]
    async fn list(&self, filter: &QuestionFilter) -> anyhow::Result<Vec<Question>> {
        let mut query = self.questions().select("*").limit(filter.limit);
        if !filter.course.trim().is_empty() {
            query = query.eq("course", filter.course.trim());
        }
        if !filter.review_status.trim().is_empty() {
            query = query.eq("review_status", filter.review_status.trim());
        }
        if !filter.chapter.trim().is_empty() {
            query = query.ilike("chapter_name", format!("%{}%", filter.chapter.trim()));
        }
        if let Some(conditions) = keyword_conditions(filter) {
            query = query.or(conditions);
        }
        rows(query.order(format!("{CREATED_AT}.desc")))
            .await
            .context("unable to fetch question pool")
    }

    #[instrument(skip_all, fields(batch = batch.len()), err(Debug))]
    async fn insert(&self, batch: &[Question]) -> anyhow::Result<()> {
        let body = serde_json::to_string(batch)?;
        write(self.questions().insert(body)).await
    }

    #[instrument(skip(self, update), err(Debug))]
    async fn update(&self, id: &QuestionId, update: &QuestionUpdate) -> anyhow::Result<()> {
        let body = serde_json::to_string(update)?;
        write(self.questions().eq(ID, id.to_string()).update(body)).await
    }

    #[instrument(skip(self), err(Debug))]
    async fn find_by_unique_id(&self, unique_id: &str) -> anyhow::Result<Option<Question>> {
        let found: Vec<Question> =
            rows(self.questions().select("*").eq(UNIQUE_ID, unique_id).limit(1)).await?;
        Ok(found.into_iter().next())
    }

    #[instrument(skip(self), err(Debug))]
    async fn distinct(&self, field: Field) -> anyhow::Result<Vec<String>> {
        let column = field.column();
        let found: Vec<serde_json::Map<String, Value>> = rows(
            self.questions()
                .select(column)
                .not("is", column, "null")
                .order(format!("{column}.asc")),
        )
        .await?;
        Ok(distinct_values(found.into_iter().filter_map(|mut row| {
            match row.remove(column)? {
                Value::Null => None,
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            }
        })))
    }
}
