//! Printable HTML for exams, single questions and statistics.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use exam_utils::{
    codec::{self, Options},
    stats::{self, CorpusStats, ExamStats},
};
use maud::{DOCTYPE, Markup, html};
use schema::{Exam, Question};
use serde_json::Value;

const DASH: &str = "—";

#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
    pub show_ids: bool,
    pub include_answers: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_ids: true,
            include_answers: true,
        }
    }
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M").to_string()
}

/// File name for an exported exam: anything outside `[A-Za-z0-9_-]` becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let name = if name.trim().is_empty() { "exam" } else { name };
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() { DASH } else { value }
}

/// Type-specific body of a question: choices, a prompt, or the expected answer.
pub fn render_question_body(question: &Question) -> Markup {
    let kind = question
        .question_type
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    if exam_utils::shuffle::is_multiple_choice(Some(kind.as_str())) && question.options.is_some() {
        // Stored lists are shown without letters, mappings with their keys.
        let is_list = question
            .options
            .as_ref()
            .and_then(codec::decode)
            .is_some_and(|v| v.is_array());
        return match codec::normalize_options(question.options.as_ref()) {
            Some(Options::Entries(entries)) => html! {
                ol class="choice-list" {
                    @for entry in &entries {
                        li {
                            @if !is_list {
                                strong { (entry.label) "." } " "
                            }
                            (entry.text)
                        }
                    }
                }
            },
            Some(Options::Opaque(text)) => html! { p { (text) } },
            None => html! {},
        };
    }
    match kind.as_str() {
        "true/false" | "true or false" | "truefalse" => {
            return html! { p { "Circle " strong { "True" } " or " strong { "False" } "." } };
        }
        "short answer" | "short-answer" => {
            return html! { p { "Write your answer in the space provided." } };
        }
        "fill-in-blank" | "fill in blank" | "fill_in_blank" => {
            return html! { p { "Complete the blank(s) with the correct term." } };
        }
        "matching" => {
            if let Some(table) = matching_table(question) {
                return table;
            }
        }
        _ => {}
    }
    match &question.correct_answer {
        Some(Value::String(s)) if !s.is_empty() && s.chars().count() < 120 => {
            html! { p { em { "Expected answer:" } " " (s) } }
        }
        _ => html! {},
    }
}

fn matching_table(question: &Question) -> Option<Markup> {
    let decoded = question.options.as_ref().and_then(codec::decode)?;
    let pairs = match decoded.get("pairs") {
        Some(Value::Object(pairs)) => pairs,
        _ => decoded.as_object()?,
    };
    Some(html! {
        table class="table" {
            tbody {
                @for (left, right) in pairs {
                    tr { td { (left) } td { (codec::value_text(right)) } }
                }
            }
        }
    })
}

fn answer_key_text(question: &Question) -> String {
    codec::format_correct_answer(question.correct_answer.as_ref())
}

/// Full exam document: header, instructions, questions and optional answer key.
pub fn render_exam(exam: &Exam, options: RenderOptions) -> Markup {
    let details = &exam.details;
    let title = if details.title.trim().is_empty() {
        "Untitled exam"
    } else {
        details.title.as_str()
    };

    let body = html! {
        header {
            h2 { (title) }
            div class="meta" {
                div { strong { "Instructor:" } " " (or_dash(&details.instructor)) }
                div { strong { "Course:" } " " (or_dash(&details.course)) }
                div { strong { "Date:" } " " (format_date(&exam.generated_at)) }
                div { strong { "Duration:" } " " (or_dash(&details.duration)) }
            }
        }
        @if !details.instructions.trim().is_empty() {
            section {
                h3 { "Instructions" }
                p { (details.instructions) }
            }
        }
        section {
            @for (index, question) in exam.questions.iter().enumerate() {
                article class="question" {
                    h3 {
                        (index + 1) "."
                        @if options.show_ids {
                            " "
                            span class="tag" {
                                (question.display_id().unwrap_or_else(|| format!("Question-{}", index + 1)))
                            }
                        }
                        " " (question.question_text.as_deref().unwrap_or("No question text"))
                    }
                    @if let Some(kind) = schema::non_blank(&question.question_type) {
                        div class="tag" { (kind) }
                    }
                    div { (render_question_body(question)) }
                    @if let Some(difficulty) = schema::non_blank(&question.difficulty) {
                        div class="tag" { "Difficulty: " (difficulty) }
                    }
                    @if let Some(summary) = schema::non_blank(&question.answer_summary) {
                        p { em { "Answer summary:" } " " (summary) }
                    }
                    @if let Some(explanation) = schema::non_blank(&question.detailed_explanation) {
                        pre { (explanation) }
                    }
                }
            }
        }
        @if options.include_answers {
            section class="answer-key" {
                h3 { "Answer key" }
                ol {
                    @for question in &exam.questions {
                        li {
                            strong { (question.display_id().unwrap_or_else(|| "Unknown ID".to_string())) }
                            ": " (answer_key_text(question))
                        }
                    }
                }
            }
        }
    };

    page(title, body)
}

/// Lookup view of a single question.
pub fn render_question_detail(question: &Question) -> Markup {
    html! {
        article class="question" {
            h3 { (question.display_id().unwrap_or_default()) }
            p { (question.question_text.as_deref().unwrap_or_default()) }
            (render_question_body(question))
            p { strong { "Correct answer:" } " " (answer_key_text(question)) }
            p { strong { "Difficulty:" } " " (or_dash(question.difficulty.as_deref().unwrap_or_default())) }
            p { strong { "Review status:" } " " (or_dash(question.review_status.as_deref().unwrap_or_default())) }
            p { strong { "Keywords:" } " " (or_dash(question.keywords.as_deref().unwrap_or_default())) }
        }
    }
}

pub fn render_stat_table(title: &str, counts: &BTreeMap<String, usize>, total: usize) -> Markup {
    html! {
        section class="stat-card" {
            h4 { (title) }
            table class="table" {
                thead { tr { th { "Value" } th { "Count" } th { "%" } } }
                tbody {
                    @for (key, count) in stats::sorted_counts(counts) {
                        tr {
                            th { (key) }
                            td { (count) }
                            td { (format!("{:.1}%", stats::percentage(count, total))) }
                        }
                    }
                }
            }
        }
    }
}

pub fn render_corpus_stats(stats: &CorpusStats) -> Markup {
    if stats.total == 0 {
        return html! { p { "No data yet. Import questions or check your Supabase configuration." } };
    }
    let cards = [
        ("Total questions", stats.total),
        ("Courses", stats.by_course.len()),
        ("Question types", stats.by_type.len()),
        ("Difficulties", stats.by_difficulty.len()),
        ("Repeated IDs", stats.repeated_ids),
    ];
    html! {
        div class="stats-grid" {
            @for (name, value) in cards {
                div class="stat-card" { h4 { (name) } p { (value) } }
            }
        }
        (render_stat_table("By course", &stats.by_course, stats.total))
        (render_stat_table("By question type", &stats.by_type, stats.total))
        (render_stat_table("By difficulty", &stats.by_difficulty, stats.total))
    }
}

pub fn render_exam_stats(exam: &Exam, stats: &ExamStats) -> Markup {
    html! {
        h3 { (exam.details.title) }
        p { "Generated " (format_date(&exam.generated_at)) " " (DASH) " " (stats.total) " questions" }
        p { "Unique questions: " (stats.unique) " · Repeated in exam: " (stats.repeated) }
        (render_stat_table("By question type", &stats.by_type, stats.total))
        (render_stat_table("By difficulty", &stats.by_difficulty, stats.total))
    }
}

/// Writes the rendered exam to `<dir>/<sanitized title>.html`.
pub async fn export_exam(exam: &Exam, options: RenderOptions, dir: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
    let path = dir
        .as_ref()
        .join(format!("{}.html", sanitize_file_name(&exam.details.title)));
    tokio::fs::write(&path, render_exam(exam, options).into_string())
        .await
        .with_context(|| format!("unable to write {}", path.display()))?;
    Ok(path)
}

/// Standalone HTML document around `body`.
pub fn page(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { (title) }
            }
            body {
                div class="exam" { (body) }
            }
        }
    }
}
