//! Field policy applied to every decoded value: length bounds, enum
//! coercion, list caps. Each adjustment is logged (never the content).

use serde_json::Value;

use crate::models::input::truncate_chars;
use crate::models::{EvidenceConfidence, GuidelineCategory, Likelihood};

pub const MAX_FIELD_CHARS: usize = 4000;
pub const MAX_CONDITION_CHARS: usize = 200;

/// Coerce a JSON value to text. Lists are joined with `separator`, scalars
/// stringified. `None` for null and for objects.
pub fn value_to_text(value: &Value, separator: &str) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| value_to_text(item, separator))
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(separator),
        ),
        Value::Null | Value::Object(_) => None,
    }
}

/// Coerce a JSON value to a list of non-empty strings. A bare string is a
/// one-item list.
pub fn value_to_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| value_to_text(item, "; "))
            .filter(|s| !s.is_empty())
            .collect(),
        other => value_to_text(other, "; ")
            .filter(|s| !s.is_empty())
            .into_iter()
            .collect(),
    }
}

/// Truncate a text field to `max` characters.
pub fn bound_text(field: &'static str, text: String, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    tracing::debug!(field, chars = count, max, "Field truncated by policy");
    truncate_chars(&text, max)
}

/// Keep the first `max` items.
pub fn cap_list<T>(field: &'static str, mut items: Vec<T>, max: usize) -> Vec<T> {
    if items.len() > max {
        tracing::debug!(field, count = items.len(), max, "List capped by policy");
        items.truncate(max);
    }
    items
}

pub fn coerce_likelihood(value: Option<&Value>) -> Likelihood {
    coerce(value, "likelihood", Likelihood::parse_lenient, Likelihood::Low)
}

pub fn coerce_category(value: Option<&Value>) -> GuidelineCategory {
    coerce(
        value,
        "category",
        GuidelineCategory::parse_lenient,
        GuidelineCategory::Other,
    )
}

pub fn coerce_confidence(value: Option<&Value>) -> EvidenceConfidence {
    coerce(
        value,
        "confidence",
        EvidenceConfidence::parse_lenient,
        EvidenceConfidence::LowEvidence,
    )
}

fn coerce<E: Copy + std::fmt::Display>(
    value: Option<&Value>,
    field: &'static str,
    parse: fn(&str) -> Option<E>,
    default: E,
) -> E {
    match value.and_then(Value::as_str).and_then(parse) {
        Some(parsed) => parsed,
        None => {
            tracing::debug!(field, coerced_to = %default, "Unknown enum value coerced by policy");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_from_scalars_and_lists() {
        assert_eq!(value_to_text(&json!(" hi "), "\n").as_deref(), Some("hi"));
        assert_eq!(value_to_text(&json!(38.5), "\n").as_deref(), Some("38.5"));
        assert_eq!(value_to_text(&json!(true), "\n").as_deref(), Some("true"));
        assert_eq!(
            value_to_text(&json!(["a", "", "b"]), "\n").as_deref(),
            Some("a\nb")
        );
        assert_eq!(value_to_text(&json!(null), "\n"), None);
        assert_eq!(value_to_text(&json!({"k": 1}), "\n"), None);
    }

    #[test]
    fn list_from_string_or_array() {
        assert_eq!(value_to_list(&json!("one")), vec!["one".to_string()]);
        assert_eq!(value_to_list(&json!(["a", 2, null])), vec!["a", "2"]);
        assert!(value_to_list(&json!("")).is_empty());
    }

    #[test]
    fn bound_text_truncates_long_fields() {
        let long = "x".repeat(MAX_FIELD_CHARS + 10);
        assert_eq!(
            bound_text("summary", long, MAX_FIELD_CHARS).chars().count(),
            MAX_FIELD_CHARS
        );
        assert_eq!(bound_text("summary", "short".into(), MAX_FIELD_CHARS), "short");
    }

    #[test]
    fn cap_list_keeps_prefix() {
        assert_eq!(cap_list("key_points", vec![1, 2, 3, 4], 2), vec![1, 2]);
        assert_eq!(cap_list("key_points", vec![1], 2), vec![1]);
    }

    #[test]
    fn unknown_enums_are_coerced_to_most_conservative() {
        assert_eq!(coerce_likelihood(Some(&json!("Certain"))), Likelihood::Low);
        assert_eq!(coerce_likelihood(None), Likelihood::Low);
        assert_eq!(coerce_likelihood(Some(&json!("high"))), Likelihood::High);
        assert_eq!(
            coerce_category(Some(&json!("Diet"))),
            GuidelineCategory::Other
        );
        assert_eq!(
            coerce_confidence(Some(&json!(3))),
            EvidenceConfidence::LowEvidence
        );
        assert_eq!(
            coerce_confidence(Some(&json!("direct"))),
            EvidenceConfidence::Direct
        );
    }
}
