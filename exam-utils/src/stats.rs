use std::collections::{BTreeMap, HashSet};

use schema::{Exam, Field, Question, Summary};
use serde::Serialize;

/// Bucket for records with a missing or blank value.
pub const UNKNOWN: &str = "Unknown";

pub fn group_count(records: &[Question], field: Field) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        let key = record.field(field).unwrap_or(UNKNOWN);
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
    counts
}

/// `count / total` as a percentage. Zero when `total` is zero.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64) * 100.0
}

/// Counts ordered by descending count, then key.
pub fn sorted_counts(counts: &BTreeMap<String, usize>) -> Vec<(&str, usize)> {
    let mut rows: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    rows
}

pub fn summarize(records: &[Question]) -> Summary {
    Summary {
        by_type: group_count(records, Field::QuestionType),
        by_difficulty: group_count(records, Field::Difficulty),
    }
}

/// Number of distinct identities (`unique_id`, else `id`). Records without
/// any identity are each counted as distinct.
fn distinct_identities(records: &[Question]) -> usize {
    let mut seen = HashSet::new();
    let mut anonymous = 0;
    for record in records {
        match record.display_id() {
            Some(id) => {
                seen.insert(id);
            }
            None => anonymous += 1,
        }
    }
    seen.len() + anonymous
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorpusStats {
    pub total: usize,
    pub by_course: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub by_difficulty: BTreeMap<String, usize>,
    pub repeated_ids: usize,
}

pub fn corpus_stats(records: &[Question]) -> CorpusStats {
    let total = records.len();
    CorpusStats {
        total,
        by_course: group_count(records, Field::Course),
        by_type: group_count(records, Field::QuestionType),
        by_difficulty: group_count(records, Field::Difficulty),
        repeated_ids: total.saturating_sub(distinct_identities(records)),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExamStats {
    pub total: usize,
    pub unique: usize,
    pub repeated: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_difficulty: BTreeMap<String, usize>,
}

pub fn exam_stats(exam: &Exam) -> ExamStats {
    let questions = &exam.questions;
    let total = questions.len();
    let unique = distinct_identities(questions);
    ExamStats {
        total,
        unique,
        repeated: total.saturating_sub(unique),
        by_type: group_count(questions, Field::QuestionType),
        by_difficulty: group_count(questions, Field::Difficulty),
    }
}
