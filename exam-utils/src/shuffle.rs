use rand::Rng;
use schema::Question;
use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    codec::{self, OptionEntry, Options},
    error::Error,
    random,
};

const MULTIPLE_CHOICE_TYPES: [&str; 4] = ["mcq", "multiple choice", "multiple-choice", "multiple_choice"];

pub fn is_multiple_choice(question_type: Option<&str>) -> bool {
    question_type
        .map(|t| t.trim().to_lowercase())
        .is_some_and(|t| MULTIPLE_CHOICE_TYPES.contains(&t.as_str()))
}

#[derive(Clone, Debug)]
struct MarkedEntry {
    entry: OptionEntry,
    is_correct: bool,
}

/// Randomly reorders a multiple-choice question's options, relabels them
/// `A`, `B`, ... and rewrites `correct_answer` to the new labels.
///
/// A single correct option is written back as a bare label, several as a list
/// of labels. Fails without touching the question when the options cannot be
/// decoded or no option matches the stored answer.
pub fn shuffle_options<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> Result<Question, Error> {
    let id = question.display_id().unwrap_or_default();
    let entries = match codec::normalize_options(question.options.as_ref()) {
        Some(Options::Entries(entries)) => entries,
        Some(Options::Opaque(_)) => {
            return Err(Error::Transform(format!(
                "Question {id} options are neither a list nor a mapping"
            )));
        }
        None => {
            return Err(Error::Transform(format!("Question {id} has no options")));
        }
    };

    let answer = codec::parse_correct_answer(question.correct_answer.as_ref());
    let mut marked: Vec<MarkedEntry> = entries
        .into_iter()
        .map(|entry| {
            let is_correct = answer.contains(&entry.label)
                || answer.contains(entry.label.trim())
                || answer.contains(entry.text.trim());
            MarkedEntry { entry, is_correct }
        })
        .collect();

    // An answer that matches no option cannot be carried over to new labels.
    if !marked.iter().any(|m| m.is_correct) {
        return Err(Error::Transform(format!(
            "Question {id} correct answer does not match any option"
        )));
    }

    random::shuffle_in_place(&mut marked, rng);

    let mut options = Map::new();
    let mut correct = vec![];
    for (index, m) in marked.into_iter().enumerate() {
        let label = codec::label_for(index);
        if m.is_correct {
            correct.push(Value::String(label.clone()));
        }
        options.insert(label, Value::String(m.entry.text));
    }

    let correct_answer = if correct.len() == 1 {
        correct.remove(0)
    } else {
        Value::Array(correct)
    };

    let mut shuffled = question.clone();
    shuffled.options = Some(Value::Object(options));
    shuffled.correct_answer = Some(correct_answer);
    Ok(shuffled)
}

/// Prepares a selected question for the exam. Multiple-choice questions get
/// their options shuffled when requested; any question that cannot be
/// shuffled is kept as stored.
pub fn transform_for_exam<R: Rng + ?Sized>(question: Question, shuffle_choices: bool, rng: &mut R) -> Question {
    if !shuffle_choices || !is_multiple_choice(question.question_type.as_deref()) {
        return question;
    }
    match shuffle_options(&question, rng) {
        Ok(shuffled) => shuffled,
        Err(e) => {
            warn!(error = %e, "failed to shuffle options, keeping original order");
            question
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{AnswerTokens, parse_correct_answer};
    use schema::QuestionId;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn mcq(options: Value, correct_answer: Value) -> Question {
        Question {
            id: Some(QuestionId::Int(1)),
            question_type: Some("MCQ".into()),
            options: Some(options),
            correct_answer: Some(correct_answer),
            ..Default::default()
        }
    }

    fn option_map(q: &Question) -> Map<String, Value> {
        match q.options.as_ref() {
            Some(Value::Object(map)) => map.clone(),
            other => panic!("expected option map, got {other:?}"),
        }
    }

    /// Texts the answer key points at.
    fn correct_texts(q: &Question) -> BTreeSet<String> {
        let answer: AnswerTokens = parse_correct_answer(q.correct_answer.as_ref());
        let Some(Options::Entries(entries)) = codec::normalize_options(q.options.as_ref()) else {
            panic!("expected entries");
        };
        entries
            .into_iter()
            .filter(|e| answer.contains(&e.label) || answer.contains(e.text.trim()))
            .map(|e| e.text)
            .collect()
    }

    #[test]
    fn single_answer_follows_its_text() {
        let q = mcq(json!({"A": "x", "B": "y", "C": "z"}), json!("B"));
        for seed in 0..20 {
            let shuffled = shuffle_options(&q, &mut StdRng::seed_from_u64(seed)).unwrap();
            let options = option_map(&shuffled);
            let labels_for_y: Vec<_> = options
                .iter()
                .filter(|(_, v)| v.as_str() == Some("y"))
                .map(|(k, _)| k.clone())
                .collect();
            assert_eq!(labels_for_y.len(), 1);
            assert_eq!(shuffled.correct_answer, Some(Value::String(labels_for_y[0].clone())));
            assert_eq!(options.keys().collect::<Vec<_>>(), ["A", "B", "C"]);
        }
    }

    #[test]
    fn encoded_multi_answer_keeps_both_texts() {
        let q = mcq(json!(["first", "second", "third", "fourth"]), json!("[\"A\",\"C\"]"));
        let shuffled = shuffle_options(&q, &mut StdRng::seed_from_u64(11)).unwrap();
        let Some(Value::Array(labels)) = shuffled.correct_answer.as_ref() else {
            panic!("expected a list of labels");
        };
        assert_eq!(labels.len(), 2);
        let options = option_map(&shuffled);
        let texts: BTreeSet<_> = labels
            .iter()
            .map(|l| options[l.as_str().unwrap()].as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts, BTreeSet::from(["first".to_string(), "third".to_string()]));
    }

    #[test]
    fn correct_texts_survive_any_permutation() {
        let questions = [
            mcq(json!(["Paris", "Rome", "Oslo"]), json!("Paris")),
            mcq(json!("{\"a\":\"1\",\"b\":\"2\",\"c\":\"3\"}"), json!("a, c")),
            mcq(json!({"A": "yes", "B": "no"}), json!({"B": "no"})),
        ];
        for q in &questions {
            let before = correct_texts(q);
            for seed in 0..10 {
                let after = shuffle_options(q, &mut StdRng::seed_from_u64(seed)).unwrap();
                assert_eq!(correct_texts(&after), before);
            }
        }
    }

    #[test]
    fn unmatched_answer_is_left_alone() {
        let q = mcq(json!(["a", "b"]), json!("Z"));
        assert!(shuffle_options(&q, &mut StdRng::seed_from_u64(0)).is_err());
        let out = transform_for_exam(q.clone(), true, &mut StdRng::seed_from_u64(0));
        assert_eq!(out, q);
    }

    #[test]
    fn opaque_options_are_left_alone() {
        let q = mcq(json!("a) one b) two"), json!("a"));
        let out = transform_for_exam(q.clone(), true, &mut StdRng::seed_from_u64(0));
        assert_eq!(out, q);
    }

    #[test]
    fn non_mcq_and_disabled_flag_pass_through() {
        let mut q = mcq(json!(["a", "b"]), json!("A"));
        assert_eq!(transform_for_exam(q.clone(), false, &mut StdRng::seed_from_u64(0)), q);
        q.question_type = Some("Essay".into());
        assert_eq!(transform_for_exam(q.clone(), true, &mut StdRng::seed_from_u64(0)), q);
    }

    #[test]
    fn recognises_multiple_choice_spellings() {
        assert!(is_multiple_choice(Some("MCQ")));
        assert!(is_multiple_choice(Some(" multiple choice ")));
        assert!(!is_multiple_choice(Some("True/False")));
        assert!(!is_multiple_choice(None));
    }
}
