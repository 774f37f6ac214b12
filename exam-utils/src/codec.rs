//! Decoding of the free-form `options` and `correct_answer` columns.
//!
//! Rows reach the store from spreadsheets, hand-written JSON and older tools,
//! so both columns may hold a list, a label map, either of those encoded as a
//! JSON string, or (for answers) a bare or comma separated string. Everything
//! downstream works on [`OptionEntry`] lists and [`AnswerTokens`] only.
use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// One labelled choice of a multiple-choice question.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionEntry {
    pub label: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Options {
    /// Ordered choices with unique labels.
    Entries(Vec<OptionEntry>),
    /// Stored text that is not a list or a map. Display as is, never shuffle.
    Opaque(String),
}

/// Canonical, trimmed, de-duplicated correct answer tokens. A token may be a
/// label (`"B"`) or an option text (`"Paris"`).
pub type AnswerTokens = BTreeSet<String>;

/// `A`, `B`, ... `Z`, `AA`, `AB`, ...
pub fn label_for(index: usize) -> String {
    let mut n = index;
    let mut label = Vec::new();
    loop {
        label.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}

/// Display text of a JSON value: strings unquoted, everything else as JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decodes a JSON-encoded string. Non-string values are returned unchanged,
/// `None` means the string is not valid JSON.
pub fn decode(raw: &Value) -> Option<Value> {
    match raw {
        Value::String(s) => serde_json::from_str(s.trim()).ok(),
        other => Some(other.clone()),
    }
}

fn is_empty(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn entries_from_list(items: &[Value]) -> Vec<OptionEntry> {
    items
        .iter()
        .enumerate()
        .map(|(i, v)| OptionEntry {
            label: label_for(i),
            text: value_text(v),
        })
        .collect()
}

fn entries_from_map(map: &Map<String, Value>) -> Vec<OptionEntry> {
    map.iter()
        .map(|(k, v)| OptionEntry {
            label: k.clone(),
            text: value_text(v),
        })
        .collect()
}

/// Normalizes a stored `options` value.
///
/// Lists are labelled positionally, maps keep their keys and key order.
/// Strings are decoded first; a string that is not JSON comes back as
/// [`Options::Opaque`]. Absent or empty input gives `None`.
pub fn normalize_options(raw: Option<&Value>) -> Option<Options> {
    let raw = raw.filter(|r| !is_empty(r))?;
    let opaque = || match raw {
        Value::String(s) => Options::Opaque(s.clone()),
        other => Options::Opaque(other.to_string()),
    };
    let Some(decoded) = decode(raw) else {
        return Some(opaque());
    };
    match decoded {
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        Value::Array(items) => Some(Options::Entries(entries_from_list(&items))),
        Value::Object(map) => Some(Options::Entries(entries_from_map(&map))),
        Value::Null => None,
        _ => Some(opaque()),
    }
}

/// Normalizes a stored `correct_answer` value into canonical tokens.
///
/// Map answers contribute both keys and values, since some sources record
/// the label and others the option text.
pub fn parse_correct_answer(raw: Option<&Value>) -> AnswerTokens {
    let mut tokens = AnswerTokens::new();
    let Some(raw) = raw else {
        return tokens;
    };
    let mut push = |token: String| {
        let token = token.trim();
        if !token.is_empty() {
            tokens.insert(token.to_string());
        }
    };

    let decoded = match raw {
        Value::Null | Value::Bool(false) => return AnswerTokens::new(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return AnswerTokens::new();
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(v) => v,
                Err(_) => {
                    if trimmed.contains(',') {
                        trimmed.split(',').for_each(|part| push(part.to_string()));
                    } else {
                        push(trimmed.to_string());
                    }
                    return tokens;
                }
            }
        }
        other => other.clone(),
    };

    match decoded {
        Value::Array(items) => items.iter().for_each(|v| push(value_text(v))),
        Value::Object(map) => {
            map.keys().for_each(|k| push(k.clone()));
            map.values().for_each(|v| push(value_text(v)));
        }
        Value::Null => {}
        other => push(value_text(&other)),
    }
    tokens
}

/// Answer key text: strings as stored, lists joined by `, `, maps as `k: v`
/// pairs joined by `; `.
pub fn format_correct_answer(raw: Option<&Value>) -> String {
    const NONE: &str = "No answer recorded";
    match raw {
        None | Some(Value::Null) => NONE.to_string(),
        Some(Value::String(s)) if s.is_empty() => NONE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", value_text(v)))
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => value_text(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tokens(items: &[&str]) -> AnswerTokens {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn labels_continue_past_z() {
        assert_eq!(label_for(0), "A");
        assert_eq!(label_for(25), "Z");
        assert_eq!(label_for(26), "AA");
        assert_eq!(label_for(27), "AB");
        assert_eq!(label_for(52), "BA");
    }

    #[test]
    fn list_options_are_labelled_positionally() {
        let options = normalize_options(Some(&json!(["red", "green", 3]))).unwrap();
        let Options::Entries(entries) = options else {
            panic!("expected entries");
        };
        let labels: Vec<_> = entries.iter().map(|e| e.label.as_str()).collect();
        let texts: Vec<_> = entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(labels, ["A", "B", "C"]);
        assert_eq!(texts, ["red", "green", "3"]);
    }

    #[test]
    fn map_options_keep_key_order() {
        let raw = json!("{\"D\":\"four\",\"A\":\"one\"}");
        let Some(Options::Entries(entries)) = normalize_options(Some(&raw)) else {
            panic!("expected entries");
        };
        assert_eq!(entries[0].label, "D");
        assert_eq!(entries[1].text, "one");
    }

    #[test]
    fn undecodable_options_are_opaque() {
        let raw = json!("A) red  B) green");
        assert_eq!(
            normalize_options(Some(&raw)),
            Some(Options::Opaque("A) red  B) green".into()))
        );
        assert_eq!(
            normalize_options(Some(&json!("\"just text\""))),
            Some(Options::Opaque("\"just text\"".into()))
        );
    }

    #[test]
    fn empty_options_are_none() {
        assert_eq!(normalize_options(None), None);
        assert_eq!(normalize_options(Some(&Value::Null)), None);
        assert_eq!(normalize_options(Some(&json!(""))), None);
        assert_eq!(normalize_options(Some(&json!([]))), None);
        assert_eq!(normalize_options(Some(&json!("{}"))), None);
    }

    #[test]
    fn answer_rules() {
        assert!(parse_correct_answer(None).is_empty());
        assert!(parse_correct_answer(Some(&json!(""))).is_empty());
        assert_eq!(parse_correct_answer(Some(&json!(" B "))), tokens(&["B"]));
        assert_eq!(
            parse_correct_answer(Some(&json!("A, C ,"))),
            tokens(&["A", "C"])
        );
        assert_eq!(
            parse_correct_answer(Some(&json!("[\"A\",\"C\"]"))),
            tokens(&["A", "C"])
        );
        assert_eq!(
            parse_correct_answer(Some(&json!(["A", " A", 2]))),
            tokens(&["A", "2"])
        );
        assert_eq!(
            parse_correct_answer(Some(&json!({"B": "Paris"}))),
            tokens(&["B", "Paris"])
        );
        assert_eq!(parse_correct_answer(Some(&json!(0))), tokens(&["0"]));
        assert_eq!(parse_correct_answer(Some(&json!("true"))), tokens(&["true"]));
    }

    #[test]
    fn answer_parsing_is_idempotent() {
        for raw in [
            json!("A, B"),
            json!("{\"x\": \" y \"}"),
            json!(["C", "A"]),
            json!("Paris"),
        ] {
            let first = parse_correct_answer(Some(&raw));
            let relisted = Value::Array(first.iter().cloned().map(Value::String).collect());
            assert_eq!(parse_correct_answer(Some(&relisted)), first);
        }
    }

    #[test]
    fn formats_answer_key() {
        assert_eq!(format_correct_answer(None), "No answer recorded");
        assert_eq!(format_correct_answer(Some(&json!("B"))), "B");
        assert_eq!(format_correct_answer(Some(&json!(["A", "C"]))), "A, C");
        assert_eq!(
            format_correct_answer(Some(&json!({"1": "b", "2": "a"}))),
            "1: b; 2: a"
        );
    }
}
