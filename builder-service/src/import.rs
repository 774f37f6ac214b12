use std::path::Path;

use anyhow::Context;
use schema::{Question, non_blank};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::db::QuestionStore;

/// Values given on the import form, applied where a row has none.
#[derive(Clone, Debug, Default)]
pub struct ImportDefaults {
    pub course: Option<String>,
    pub review_status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportReport {
    pub questions: usize,
    pub batches: usize,
}

/// Reads a `.csv` (header row required) or JSON question file.
#[instrument(skip_all, fields(path = %path.as_ref().display()), err(Debug))]
pub async fn parse_file(path: impl AsRef<Path>) -> anyhow::Result<Vec<Question>> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("unable to read {}", path.display()))?;
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        parse_csv(&text)
    } else {
        parse_json(&text)
    }
}

/// One record per non-empty row, keyed by the header row.
pub fn parse_csv(text: &str) -> anyhow::Result<Vec<Question>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().context("unable to read CSV header row")?.clone();

    let mut questions = vec![];
    let mut errors = vec![];
    for (index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                errors.push(e.to_string());
                continue;
            }
        };
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, cell)| (h.trim().to_string(), Value::String(cell.to_string())))
            .collect();
        match serde_json::from_value::<Question>(Value::Object(row)) {
            Ok(q) => questions.push(q),
            Err(e) => errors.push(format!("row {}: {e}", index + 2)),
        }
    }

    if !errors.is_empty() {
        anyhow::bail!(errors.join("\n"));
    }
    Ok(questions)
}

/// A top-level list, or an object wrapping one under `questions` or `items`.
/// Any other shape yields no records.
pub fn parse_json(text: &str) -> anyhow::Result<Vec<Question>> {
    let data: Value = serde_json::from_str(text).context("file is not valid JSON")?;
    let items = match data {
        Value::Array(items) => items,
        Value::Object(mut map) => match (map.remove("questions"), map.remove("items")) {
            (Some(Value::Array(items)), _) => items,
            (_, Some(Value::Array(items))) => items,
            _ => vec![],
        },
        _ => vec![],
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item).with_context(|| format!("question {} is malformed", i + 1))
        })
        .collect()
}

/// Fills in missing `course` and `review_status` from the import form.
pub fn decorate(questions: Vec<Question>, defaults: &ImportDefaults) -> Vec<Question> {
    let course = non_blank(&defaults.course).map(str::to_string);
    let review_status = non_blank(&defaults.review_status).map(str::to_string);
    questions
        .into_iter()
        .map(|mut q| {
            if non_blank(&q.course).is_none() {
                q.course = course.clone();
            }
            if non_blank(&q.review_status).is_none() {
                q.review_status = review_status.clone();
            }
            q
        })
        .collect()
}

/// Inserts `questions` in batches, in order. Stops at the first batch the
/// store rejects; earlier batches stay inserted.
#[instrument(skip_all, fields(questions = questions.len()), err(Debug))]
pub async fn import_questions<S: QuestionStore>(
    store: &S,
    questions: &[Question],
    batch_size: usize,
) -> anyhow::Result<ImportReport> {
    if questions.is_empty() {
        anyhow::bail!("No questions found in the provided file.");
    }
    let batches: Vec<&[Question]> = questions.chunks(batch_size.max(1)).collect();
    let total = batches.len();
    for (index, batch) in batches.into_iter().enumerate() {
        info!(batch = index + 1, total, "uploading batch");
        store
            .insert(batch)
            .await
            .with_context(|| format!("Batch {}/{total} failed", index + 1))?;
    }
    info!(questions = questions.len(), "import complete");
    Ok(ImportReport {
        questions: questions.len(),
        batches: total,
    })
}
