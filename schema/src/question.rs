use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Row identity as issued by the store. Older tables use integer keys, newer
/// ones text/uuid keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionId {
    Int(i64),
    Text(String),
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionId::Int(i) => write!(f, "{i}"),
            QuestionId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for QuestionId {
    fn from(value: i64) -> Self {
        QuestionId::Int(value)
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        match value.trim().parse::<i64>() {
            Ok(i) => QuestionId::Int(i),
            Err(_) => QuestionId::Text(value.trim().to_string()),
        }
    }
}

/// A row of the `questions` table.
///
/// `options` and `correct_answer` are kept as raw JSON: they arrive as lists,
/// label maps, JSON-encoded strings or delimited strings depending on who
/// imported the row. `exam_utils::codec` is the only place that interprets them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Question {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<QuestionId>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub question_type: Option<String>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub chapter_name: Option<String>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub review_status: Option<String>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<Value>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub answer_summary: Option<String>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub detailed_explanation: Option<String>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub instructor_notes: Option<String>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Columns the builder does not interpret, carried through imports and
    /// history unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Classification columns that can be grouped on or offered as choices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Course,
    QuestionType,
    Difficulty,
    ChapterName,
    ReviewStatus,
}

impl Field {
    pub fn column(&self) -> &'static str {
        match self {
            Field::Course => "course",
            Field::QuestionType => "question_type",
            Field::Difficulty => "difficulty",
            Field::ChapterName => "chapter_name",
            Field::ReviewStatus => "review_status",
        }
    }
}

impl Question {
    /// Value of a classification column, `None` when absent or blank.
    pub fn field(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Course => &self.course,
            Field::QuestionType => &self.question_type,
            Field::Difficulty => &self.difficulty,
            Field::ChapterName => &self.chapter_name,
            Field::ReviewStatus => &self.review_status,
        };
        non_blank(value)
    }

    /// Human-readable identity: `unique_id` if set, otherwise the row id.
    pub fn display_id(&self) -> Option<String> {
        non_blank(&self.unique_id)
            .map(str::to_string)
            .or_else(|| self.id.as_ref().map(ToString::to_string))
    }

    /// Merges a partial edit into this record.
    pub fn apply(&mut self, update: &QuestionUpdate) {
        let QuestionUpdate {
            difficulty,
            keywords,
            answer_summary,
            detailed_explanation,
            instructor_notes,
            review_status,
        } = update;
        let pairs = [
            (&mut self.difficulty, difficulty),
            (&mut self.keywords, keywords),
            (&mut self.answer_summary, answer_summary),
            (&mut self.detailed_explanation, detailed_explanation),
            (&mut self.instructor_notes, instructor_notes),
            (&mut self.review_status, review_status),
        ];
        for (target, value) in pairs {
            if let Some(value) = value {
                *target = Some(value.clone());
            }
        }
    }
}

/// The editable subset of a question. Unset fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_status: Option<String>,
}

impl QuestionUpdate {
    pub fn is_empty(&self) -> bool {
        *self == QuestionUpdate::default()
    }
}

pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Accepts strings, numbers and booleans for text columns. Lists are joined
/// with `, ` (keyword columns are sometimes exported as arrays).
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let text = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s,
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(other @ Value::Object(_)) => other.to_string(),
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(text))
}
