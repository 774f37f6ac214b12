use std::path::PathBuf;

use anyhow::Context;
use exam_utils::{
    generation::{ExamRequest, Generation, assemble},
    stats::{self, CorpusStats, ExamStats},
};
use rand::Rng;
use schema::{Exam, Field, Question, QuestionId, QuestionUpdate};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::{QuestionStore, fetch_all},
    history::ExamHistory,
    import::{ImportReport, import_questions},
};

/// Session state of the exam builder over one question store.
pub struct App<S> {
    store: S,
    page_size: usize,
    corpus: Vec<Question>,
    types: Vec<String>,
    difficulties: Vec<String>,
    current: Option<Exam>,
    history: ExamHistory,
    history_path: PathBuf,
}

impl<S: QuestionStore> App<S> {
    /// Loads the history file. The corpus stays empty until [`App::refresh`].
    pub async fn new(store: S, page_size: usize, history_path: impl Into<PathBuf>) -> Self {
        let history_path = history_path.into();
        let history = ExamHistory::load(&history_path).await;
        Self {
            store,
            page_size,
            corpus: vec![],
            types: vec![],
            difficulties: vec![],
            current: None,
            history,
            history_path,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn corpus(&self) -> &[Question] {
        &self.corpus
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn difficulties(&self) -> &[String] {
        &self.difficulties
    }

    pub fn current(&self) -> Option<&Exam> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &ExamHistory {
        &self.history
    }

    /// Replaces the cached corpus and the type/difficulty choices.
    #[instrument(skip(self), err(Debug))]
    pub async fn refresh(&mut self) -> anyhow::Result<()> {
        self.corpus = fetch_all(&self.store, self.page_size).await?;
        self.types = self.store.distinct(Field::QuestionType).await?;
        self.difficulties = self.store.distinct(Field::Difficulty).await?;
        info!(
            questions = self.corpus.len(),
            types = self.types.len(),
            difficulties = self.difficulties.len(),
            "corpus refreshed"
        );
        Ok(())
    }

    /// Uploads parsed questions in batches, then refetches the corpus so the
    /// new rows are available for generation.
    #[instrument(skip_all, fields(questions = questions.len()), err(Debug))]
    pub async fn import(&mut self, questions: &[Question], batch_size: usize) -> anyhow::Result<ImportReport> {
        self.store.ping().await?;
        let report = import_questions(&self.store, questions, batch_size).await?;
        self.refresh().await?;
        Ok(report)
    }

    /// Draws a new exam, records it in history and makes it current.
    #[instrument(skip_all, err(Debug))]
    pub async fn generate<R: Rng + ?Sized>(
        &mut self,
        request: &ExamRequest,
        rng: &mut R,
    ) -> anyhow::Result<Generation> {
        if request.targets.is_empty() {
            anyhow::bail!("Set at least one question type or difficulty count to generate an exam.");
        }
        let pool = self.store.list(&request.filters).await?;
        if pool.is_empty() {
            anyhow::bail!("No questions matched your filters.");
        }

        let generation = assemble(&pool, request, rng)?;
        for shortfall in &generation.shortfalls {
            warn!(
                key = %shortfall.key,
                requested = shortfall.requested,
                available = shortfall.available,
                "target not fully satisfied"
            );
        }

        self.history.upsert(generation.exam.clone());
        self.current = Some(generation.exam.clone());
        self.save_history().await?;
        Ok(generation)
    }

    /// Persists an edit, then reflects it in the corpus, the current exam and
    /// every stored exam embedding the question.
    #[instrument(skip(self, update), err(Debug))]
    pub async fn edit_question(&mut self, id: &QuestionId, update: &QuestionUpdate) -> anyhow::Result<()> {
        if update.is_empty() {
            anyhow::bail!("Nothing to update.");
        }
        self.store
            .update(id, update)
            .await
            .with_context(|| format!("unable to update question {id}"))?;
        self.refresh().await?;

        if let Some(current) = self.current.as_mut() {
            for question in current.questions.iter_mut().filter(|q| q.id.as_ref() == Some(id)) {
                question.apply(update);
            }
        }
        let changed = self.history.apply_question_update(id, update);
        if let Some(current) = &self.current {
            self.history.upsert(current.clone());
        }
        info!(exams = changed, "question edit propagated");
        self.save_history().await
    }

    /// Makes a stored exam current again.
    pub fn reopen(&mut self, exam_id: &Uuid) -> anyhow::Result<&Exam> {
        let exam = self
            .history
            .get(exam_id)
            .cloned()
            .with_context(|| format!("no exam {exam_id} in history"))?;
        Ok(self.current.insert(exam))
    }

    pub async fn lookup(&self, unique_id: &str) -> anyhow::Result<Option<Question>> {
        let unique_id = unique_id.trim();
        if unique_id.is_empty() {
            return Ok(None);
        }
        self.store.find_by_unique_id(unique_id).await
    }

    pub fn global_stats(&self) -> CorpusStats {
        stats::corpus_stats(&self.corpus)
    }

    pub fn exam_stats(&self) -> Option<ExamStats> {
        self.current.as_ref().map(stats::exam_stats)
    }

    async fn save_history(&self) -> anyhow::Result<()> {
        self.history.save(&self.history_path).await
    }
}
