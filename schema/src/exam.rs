use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::question::Question;

pub const DEFAULT_QUESTION_LIMIT: usize = 200;

/// Store-side filters narrowing the pool before sampling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionFilter {
    /// Comma separated; each keyword is matched against text, keywords and summary.
    pub keywords: String,
    pub chapter: String,
    pub review_status: String,
    pub course: String,
    pub limit: usize,
}

impl Default for QuestionFilter {
    fn default() -> Self {
        Self {
            keywords: String::new(),
            chapter: String::new(),
            review_status: String::new(),
            course: String::new(),
            limit: DEFAULT_QUESTION_LIMIT,
        }
    }
}

impl QuestionFilter {
    pub fn keyword_list(&self) -> Vec<&str> {
        self.keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .collect()
    }
}

/// A requested count for one type or difficulty value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub key: String,
    pub count: usize,
}

impl Target {
    pub fn new(key: impl Into<String>, count: usize) -> Self {
        Self {
            key: key.into(),
            count,
        }
    }
}

/// Per-type and per-difficulty quantities. Order is significant: targets are
/// drawn in the order given.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Targets {
    pub by_type: Vec<Target>,
    pub by_difficulty: Vec<Target>,
}

impl Targets {
    /// True when no target asks for at least one question.
    pub fn is_empty(&self) -> bool {
        self.by_type
            .iter()
            .chain(self.by_difficulty.iter())
            .all(|t| t.count == 0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Summary {
    pub by_type: BTreeMap<String, usize>,
    pub by_difficulty: BTreeMap<String, usize>,
}

/// Cover page metadata supplied by the instructor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamDetails {
    pub title: String,
    pub instructor: String,
    pub course: String,
    pub duration: String,
    pub instructions: String,
}

/// A generated exam, as shown, exported and kept in history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: ExamDetails,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub filters: QuestionFilter,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub summary: Summary,
}
