//! Table and column names of the question store.

pub const QUESTIONS_TABLE: &str = "questions";

/// Columns searched by the free-text keyword filter.
pub const KEYWORD_COLUMNS: [&str; 3] = ["question_text", "keywords", "answer_summary"];

pub const CREATED_AT: &str = "created_at";
pub const UNIQUE_ID: &str = "unique_id";
pub const ID: &str = "id";
