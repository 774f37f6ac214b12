use std::collections::HashSet;

use rand::Rng;
use schema::{Field, Question, Summary, Target, Targets};
use serde::Serialize;
use tracing::{trace, warn};

use crate::{random, stats};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Type,
    Difficulty,
}

impl Dimension {
    fn field(&self) -> Field {
        match self {
            Dimension::Type => Field::QuestionType,
            Dimension::Difficulty => Field::Difficulty,
        }
    }
}

/// A target that could not be met from the pool. Not an error: the selection
/// keeps whatever was available.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub dimension: Dimension,
    pub key: String,
    pub requested: usize,
    pub available: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    pub questions: Vec<Question>,
    pub summary: Summary,
    pub shortfalls: Vec<Shortfall>,
}

fn matches(question: &Question, field: Field, key: &str) -> bool {
    question.field(field) == Some(key.trim())
}

/// Moves up to `count` random records matching `key` out of `remaining`.
/// Returns the drawn records and how many matching records there were.
fn draw_matching<R: Rng + ?Sized>(
    remaining: &mut Vec<Question>,
    field: Field,
    key: &str,
    count: usize,
    rng: &mut R,
) -> (Vec<Question>, usize) {
    let candidates: Vec<usize> = remaining
        .iter()
        .enumerate()
        .filter(|(_, q)| matches(q, field, key))
        .map(|(i, _)| i)
        .collect();

    let mut picked: Vec<usize> = random::draw_indices(candidates.len(), count, rng)
        .into_iter()
        .map(|p| candidates[p])
        .collect();
    // Highest index first so earlier removals do not shift later ones.
    picked.sort_unstable_by(|a, b| b.cmp(a));

    let drawn = picked.into_iter().map(|i| remaining.remove(i)).collect();
    (drawn, candidates.len())
}

/// Draws a de-duplicated exam selection from `pool`.
///
/// Type targets are drawn first. Difficulty targets then only top up: a
/// difficulty already represented `n` times by the type draws needs
/// `target - n` more records, and none when `n >= target`. Both phases draw
/// without replacement from what is left of the pool. The result is shuffled
/// once more so its order says nothing about the draw order.
pub fn select_questions<R: Rng + ?Sized>(pool: &[Question], targets: &Targets, rng: &mut R) -> Selection {
    let mut remaining = pool.to_vec();
    let mut result: Vec<Question> = vec![];
    let mut shortfalls = vec![];

    for Target { key, count } in targets.by_type.iter().filter(|t| t.count > 0) {
        let (drawn, available) =
            draw_matching(&mut remaining, Dimension::Type.field(), key, *count, rng);
        if available < *count {
            warn!(
                question_type = %key,
                requested = count,
                available,
                "not enough questions for type"
            );
            shortfalls.push(Shortfall {
                dimension: Dimension::Type,
                key: key.clone(),
                requested: *count,
                available,
            });
        }
        trace!(question_type = %key, drawn = drawn.len(), "type phase draw");
        result.extend(drawn);
    }

    for Target { key, count: target } in targets.by_difficulty.iter().filter(|t| t.count > 0) {
        let field = Dimension::Difficulty.field();
        let current = result.iter().filter(|q| matches(q, field, key)).count();
        if current >= *target {
            trace!(difficulty = %key, current, target, "difficulty already satisfied");
            continue;
        }
        let needed = target - current;
        let (drawn, available) = draw_matching(&mut remaining, field, key, needed, rng);
        if available < needed {
            warn!(
                difficulty = %key,
                requested = target,
                available = current + available,
                "not enough questions for difficulty"
            );
            shortfalls.push(Shortfall {
                dimension: Dimension::Difficulty,
                key: key.clone(),
                requested: *target,
                available: current + available,
            });
        }
        trace!(difficulty = %key, drawn = drawn.len(), "difficulty phase top-up");
        result.extend(drawn);
    }

    let mut questions = deduplicate(result);
    random::shuffle_in_place(&mut questions, rng);
    let summary = stats::summarize(&questions);

    Selection {
        questions,
        summary,
        shortfalls,
    }
}

/// Keeps the first record of each id. Records without an id are kept.
fn deduplicate(questions: Vec<Question>) -> Vec<Question> {
    let mut seen = HashSet::new();
    questions
        .into_iter()
        .filter(|q| match &q.id {
            Some(id) => seen.insert(id.clone()),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use schema::QuestionId;

    fn q(id: i64, question_type: &str, difficulty: &str) -> Question {
        Question {
            id: Some(QuestionId::Int(id)),
            question_type: Some(question_type.into()),
            difficulty: Some(difficulty.into()),
            ..Default::default()
        }
    }

    fn ids(questions: &[Question]) -> Vec<QuestionId> {
        let mut ids: Vec<_> = questions.iter().filter_map(|q| q.id.clone()).collect();
        ids.sort();
        ids
    }

    /// 6 MCQ (ids 1-6) and 4 Essay (ids 7-10).
    fn pool() -> Vec<Question> {
        let mut pool = vec![];
        for i in 1..=6 {
            pool.push(q(i, "MCQ", if i <= 2 { "Hard" } else { "Easy" }));
        }
        for i in 7..=10 {
            pool.push(q(i, "Essay", "Medium"));
        }
        pool
    }

    fn targets(by_type: &[(&str, usize)], by_difficulty: &[(&str, usize)]) -> Targets {
        Targets {
            by_type: by_type.iter().map(|(k, c)| Target::new(*k, *c)).collect(),
            by_difficulty: by_difficulty.iter().map(|(k, c)| Target::new(*k, *c)).collect(),
        }
    }

    #[test]
    fn type_targets_are_met_exactly() {
        let pool = pool();
        for seed in 0..25 {
            let selection = select_questions(
                &pool,
                &targets(&[("MCQ", 4), ("Essay", 2)], &[]),
                &mut StdRng::seed_from_u64(seed),
            );
            assert_eq!(selection.questions.len(), 6);
            assert_eq!(selection.summary.by_type["MCQ"], 4);
            assert_eq!(selection.summary.by_type["Essay"], 2);
            let mut unique = ids(&selection.questions);
            unique.dedup();
            assert_eq!(unique.len(), 6);
            assert!(selection.shortfalls.is_empty());
        }
    }

    #[test]
    fn type_draws_never_exceed_availability() {
        let pool = pool();
        let selection = select_questions(
            &pool,
            &targets(&[("Essay", 9), ("Oral", 2)], &[]),
            &mut StdRng::seed_from_u64(3),
        );
        assert_eq!(ids(&selection.questions), ids(&pool[6..]));
        assert_eq!(
            selection.shortfalls,
            vec![
                Shortfall {
                    dimension: Dimension::Type,
                    key: "Essay".into(),
                    requested: 9,
                    available: 4,
                },
                Shortfall {
                    dimension: Dimension::Type,
                    key: "Oral".into(),
                    requested: 2,
                    available: 0,
                },
            ]
        );
    }

    #[test]
    fn satisfied_difficulty_draws_nothing_more() {
        // Every Essay is Medium, so the type phase already yields 4 Medium.
        let pool = pool();
        for seed in 0..10 {
            let selection = select_questions(
                &pool,
                &targets(&[("Essay", 4)], &[("Medium", 3)]),
                &mut StdRng::seed_from_u64(seed),
            );
            assert_eq!(selection.questions.len(), 4);
            assert_eq!(selection.summary.by_difficulty["Medium"], 4);
        }
    }

    #[test]
    fn difficulty_tops_up_the_difference() {
        let pool = pool();
        for seed in 0..10 {
            let selection = select_questions(
                &pool,
                &targets(&[("Essay", 1)], &[("Medium", 3), ("Easy", 2)]),
                &mut StdRng::seed_from_u64(seed),
            );
            assert_eq!(selection.summary.by_difficulty["Medium"], 3);
            assert_eq!(selection.summary.by_difficulty["Easy"], 2);
            assert_eq!(selection.questions.len(), 5);
        }
    }

    #[test]
    fn scarce_difficulty_records_shortfall() {
        let pool = vec![q(1, "MCQ", "Hard"), q(2, "MCQ", "Easy"), q(3, "Essay", "Easy")];
        let selection = select_questions(
            &pool,
            &targets(&[], &[("Hard", 3)]),
            &mut StdRng::seed_from_u64(0),
        );
        assert_eq!(ids(&selection.questions), vec![QuestionId::Int(1)]);
        assert_eq!(
            selection.shortfalls,
            vec![Shortfall {
                dimension: Dimension::Difficulty,
                key: "Hard".into(),
                requested: 3,
                available: 1,
            }]
        );
    }

    #[test]
    fn no_targets_select_nothing() {
        let selection = select_questions(&pool(), &Targets::default(), &mut StdRng::seed_from_u64(0));
        assert!(selection.questions.is_empty());
        assert!(selection.summary.by_type.is_empty());
    }

    #[test]
    fn duplicate_pool_rows_collapse() {
        let pool = vec![q(1, "MCQ", "Easy"), q(1, "MCQ", "Easy"), q(2, "MCQ", "Easy")];
        let selection = select_questions(
            &pool,
            &targets(&[("MCQ", 3)], &[]),
            &mut StdRng::seed_from_u64(0),
        );
        assert_eq!(ids(&selection.questions), vec![QuestionId::Int(1), QuestionId::Int(2)]);
    }

    #[test]
    fn missing_classification_is_unknown_in_summary() {
        let mut pool = pool();
        pool[0].difficulty = None;
        let selection = select_questions(
            &pool,
            &targets(&[("MCQ", 6)], &[]),
            &mut StdRng::seed_from_u64(0),
        );
        assert_eq!(selection.summary.by_difficulty[stats::UNKNOWN], 1);
    }

    #[test]
    fn same_seed_same_selection() {
        let pool = pool();
        let t = targets(&[("MCQ", 3)], &[("Medium", 2)]);
        let a = select_questions(&pool, &t, &mut StdRng::seed_from_u64(42));
        let b = select_questions(&pool, &t, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
