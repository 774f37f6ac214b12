use chrono::Utc;
use rand::Rng;
use schema::{Exam, ExamDetails, Question, QuestionFilter, Targets};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    error::Error,
    random,
    selection::{Shortfall, select_questions},
    shuffle::transform_for_exam,
    stats,
};

/// Everything an instructor submits to generate one exam.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamRequest {
    pub details: ExamDetails,
    pub filters: QuestionFilter,
    pub targets: Targets,
    pub shuffle_choices: bool,
}

#[derive(Clone, Debug)]
pub struct Generation {
    pub exam: Exam,
    /// Targets the pool could not fully satisfy.
    pub shortfalls: Vec<Shortfall>,
}

/// Given a pool, use the request to create an exam.
///
/// Fails with [`Error::EmptySelection`] when no question could be selected.
/// The filters are recorded on the exam as submitted; they are not re-applied.
#[instrument(skip_all, fields(pool = pool.len()))]
pub fn assemble<R: Rng + ?Sized>(
    pool: &[Question],
    request: &ExamRequest,
    rng: &mut R,
) -> Result<Generation, Error> {
    let selection = select_questions(pool, &request.targets, rng);
    if selection.questions.is_empty() {
        return Err(Error::EmptySelection);
    }

    let mut questions = Vec::with_capacity(selection.questions.len());
    for question in selection.questions {
        questions.push(transform_for_exam(question, request.shuffle_choices, rng));
    }
    debug!(questions = questions.len(), "exam assembled");

    let exam = Exam {
        id: random::uuid(rng),
        details: request.details.clone(),
        generated_at: Utc::now(),
        filters: request.filters.clone(),
        questions,
        summary: selection.summary,
    };

    Ok(Generation {
        exam,
        shortfalls: selection.shortfalls,
    })
}

/// Given a generated exam, validate it for basic properties:
/// 1) No duplicate question ids
/// 2) Summary agrees with the questions
///
/// `unique_id` is a human-facing label and may repeat across rows.
pub fn validate_generation(exam: &Exam) -> Result<(), Error> {
    let mut ids = vec![];
    for question in &exam.questions {
        if let Some(id) = &question.id {
            if ids.contains(&id) {
                return Err(Error::Generation(format!(
                    "question id {} duplicate of question id in exam {}",
                    id, exam.id
                )));
            }
            ids.push(id);
        }
    }

    let summary = stats::summarize(&exam.questions);
    if summary != exam.summary {
        return Err(Error::Generation(format!(
            "summary of exam {} does not match its questions: expected {:?}, found {:?}",
            exam.id, summary, exam.summary
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use schema::{QuestionId, Target};
    use serde_json::{Value, json};

    fn pool() -> Vec<Question> {
        (1..=10)
            .map(|i| Question {
                id: Some(QuestionId::Int(i)),
                unique_id: Some(format!("Q-{i}")),
                question_type: Some(if i <= 6 { "MCQ" } else { "Essay" }.into()),
                difficulty: Some("Easy".into()),
                options: (i <= 6).then(|| json!({"A": "x", "B": "y", "C": "z"})),
                correct_answer: Some(json!("B")),
                ..Default::default()
            })
            .collect()
    }

    fn request(shuffle_choices: bool) -> ExamRequest {
        ExamRequest {
            details: ExamDetails {
                title: "Midterm".into(),
                instructor: "Dr. Rivera".into(),
                ..Default::default()
            },
            filters: QuestionFilter {
                course: "CS101".into(),
                ..Default::default()
            },
            targets: Targets {
                by_type: vec![Target::new("MCQ", 4), Target::new("Essay", 2)],
                by_difficulty: vec![],
            },
            shuffle_choices,
        }
    }

    #[test]
    fn assembles_a_valid_exam() {
        let generation = assemble(&pool(), &request(true), &mut StdRng::seed_from_u64(5)).unwrap();
        let exam = &generation.exam;
        assert_eq!(exam.questions.len(), 6);
        assert_eq!(exam.details.title, "Midterm");
        assert_eq!(exam.filters.course, "CS101");
        assert_eq!(exam.summary.by_type["MCQ"], 4);
        assert!(generation.shortfalls.is_empty());
        validate_generation(exam).unwrap();

        for question in exam.questions.iter().filter(|q| q.question_type.as_deref() == Some("MCQ")) {
            let Some(Value::String(label)) = &question.correct_answer else {
                panic!("expected a single label");
            };
            let Some(codec::Options::Entries(entries)) = codec::normalize_options(question.options.as_ref())
            else {
                panic!("expected entries");
            };
            let entry = entries.iter().find(|e| &e.label == label).unwrap();
            assert_eq!(entry.text, "y");
        }
    }

    #[test]
    fn without_shuffle_questions_are_untouched() {
        let pool = pool();
        let generation = assemble(&pool, &request(false), &mut StdRng::seed_from_u64(5)).unwrap();
        for question in &generation.exam.questions {
            assert!(pool.contains(question));
        }
    }

    #[test]
    fn empty_targets_fail() {
        let mut request = request(false);
        request.targets = Targets::default();
        let err = assemble(&pool(), &request, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, Error::EmptySelection));
    }

    #[test]
    fn unmatched_targets_fail() {
        let mut request = request(false);
        request.targets = Targets {
            by_type: vec![Target::new("Oral", 3)],
            by_difficulty: vec![Target::new("Hard", 1)],
        };
        let err = assemble(&pool(), &request, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, Error::EmptySelection));
    }

    #[test]
    fn rejects_duplicates_and_stale_summaries() {
        let mut exam = assemble(&pool(), &request(false), &mut StdRng::seed_from_u64(1))
            .unwrap()
            .exam;
        let mut stale = exam.clone();
        stale.questions.pop();
        assert!(validate_generation(&stale).is_err());

        let first = exam.questions[0].clone();
        exam.questions.push(first);
        exam.summary = stats::summarize(&exam.questions);
        assert!(matches!(validate_generation(&exam), Err(Error::Generation(_))));
    }

    #[test]
    fn shared_unique_ids_are_valid() {
        let pool: Vec<Question> = (1..=2)
            .map(|i| Question {
                id: Some(QuestionId::Int(i)),
                unique_id: Some("CH1-1".into()),
                question_type: Some("Essay".into()),
                ..Default::default()
            })
            .collect();
        let mut request = request(false);
        request.targets = Targets {
            by_type: vec![Target::new("Essay", 2)],
            by_difficulty: vec![],
        };
        let exam = assemble(&pool, &request, &mut StdRng::seed_from_u64(2)).unwrap().exam;
        assert_eq!(exam.questions.len(), 2);
        validate_generation(&exam).unwrap();
    }
}
