use std::path::Path;

use anyhow::Context;
use schema::{Exam, QuestionId, QuestionUpdate};
use tracing::warn;
use uuid::Uuid;

pub const MAX_HISTORY: usize = 15;

/// Recently generated exams, most recent first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExamHistory {
    entries: Vec<Exam>,
}

impl ExamHistory {
    pub fn entries(&self) -> &[Exam] {
        &self.entries
    }

    pub fn get(&self, id: &Uuid) -> Option<&Exam> {
        self.entries.iter().find(|e| &e.id == id)
    }

    /// Puts `exam` at the front, replacing any entry with the same id.
    pub fn upsert(&mut self, exam: Exam) {
        self.entries.retain(|e| e.id != exam.id);
        self.entries.insert(0, exam);
        self.entries.truncate(MAX_HISTORY);
    }

    /// Applies a question edit to every stored exam that embeds the question.
    /// Returns how many exams changed.
    pub fn apply_question_update(&mut self, id: &QuestionId, update: &QuestionUpdate) -> usize {
        let mut changed = 0;
        for exam in &mut self.entries {
            let mut touched = false;
            for question in exam.questions.iter_mut().filter(|q| q.id.as_ref() == Some(id)) {
                question.apply(update);
                touched = true;
            }
            if touched {
                changed += 1;
            }
        }
        changed
    }

    /// Reads the history file. A missing or unreadable file is an empty history.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let text = match tokio::fs::read_to_string(path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "unable to read exam history");
                return Self::default();
            }
        };
        match serde_json::from_str::<Vec<Exam>>(&text) {
            Ok(mut entries) => {
                entries.truncate(MAX_HISTORY);
                Self { entries }
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to parse exam history");
                Self::default()
            }
        }
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.entries)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("unable to write exam history to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use schema::{ExamDetails, Question};

    fn exam(title: &str) -> Exam {
        Exam {
            id: Uuid::new_v4(),
            details: ExamDetails {
                title: title.into(),
                ..Default::default()
            },
            generated_at: Utc::now(),
            filters: Default::default(),
            questions: vec![Question {
                id: Some(QuestionId::Int(1)),
                ..Default::default()
            }],
            summary: Default::default(),
        }
    }

    #[test]
    fn upsert_moves_to_front_and_caps() {
        let mut history = ExamHistory::default();
        let first = exam("first");
        history.upsert(first.clone());
        for i in 0..MAX_HISTORY {
            history.upsert(exam(&format!("exam {i}")));
        }
        assert_eq!(history.entries().len(), MAX_HISTORY);
        assert!(history.get(&first.id).is_none());

        let kept = history.entries()[5].clone();
        let mut renamed = kept.clone();
        renamed.details.title = "renamed".into();
        history.upsert(renamed);
        assert_eq!(history.entries().len(), MAX_HISTORY);
        assert_eq!(history.entries()[0].id, kept.id);
        assert_eq!(history.entries()[0].details.title, "renamed");
        assert_eq!(history.entries().iter().filter(|e| e.id == kept.id).count(), 1);
    }

    #[test]
    fn question_edits_reach_stored_exams() {
        let mut history = ExamHistory::default();
        history.upsert(exam("a"));
        history.upsert(exam("b"));
        let update = QuestionUpdate {
            difficulty: Some("Hard".into()),
            ..Default::default()
        };
        assert_eq!(history.apply_question_update(&QuestionId::Int(1), &update), 2);
        assert_eq!(history.apply_question_update(&QuestionId::Int(9), &update), 0);
        assert!(
            history
                .entries()
                .iter()
                .all(|e| e.questions[0].difficulty.as_deref() == Some("Hard"))
        );
    }

    #[tokio::test]
    async fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        assert_eq!(ExamHistory::load(&path).await, ExamHistory::default());

        let mut history = ExamHistory::default();
        history.upsert(exam("saved"));
        history.save(&path).await.unwrap();
        assert_eq!(ExamHistory::load(&path).await, history);

        tokio::fs::write(&path, "{ not json").await.unwrap();
        assert_eq!(ExamHistory::load(&path).await, ExamHistory::default());
    }
}
