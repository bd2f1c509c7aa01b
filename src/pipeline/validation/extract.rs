//! Pull one JSON object out of raw model text.
//!
//! Models wrap their JSON in thinking blocks, code fences and trailing prose.
//! Extraction order: whole text, last balanced object, first balanced object.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::SchemaViolation;

/// Complete `<unusedN>thought ... <unusedM>` thinking blocks.
static THINKING_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<unused\d+>thought.*?<unused\d+>").expect("valid regex"));

static UNUSED_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<unused\d+>(?:thought\s*)?").expect("valid regex"));

static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json|JSON)?\s*").expect("valid regex"));

/// Strip model artifacts: thinking blocks, stray `<unusedN>` tokens, code fences.
pub fn strip_model_artifacts(raw: &str) -> String {
    let text = THINKING_BLOCK_RE.replace_all(raw, "");
    let text = UNUSED_TOKEN_RE.replace_all(&text, "");
    let text = CODE_FENCE_RE.replace_all(&text, "");
    text.trim().to_string()
}

/// Extract the JSON object the model most likely meant as its answer.
pub fn extract_json_object(raw: &str) -> Result<Map<String, Value>, SchemaViolation> {
    let text = strip_model_artifacts(raw);
    if text.is_empty() {
        return Err(SchemaViolation::EmptyResponse);
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text) {
        return Ok(map);
    }

    let spans = top_level_object_spans(&text);
    // The answer usually follows any reasoning, so try the last object first.
    let candidates = spans.last().into_iter().chain(spans.first());
    for &(start, end) in candidates {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[start..end]) {
            return Ok(map);
        }
    }

    Err(SchemaViolation::NoJsonObject)
}

/// Byte spans of every balanced top-level `{...}` in `text`.
/// Braces inside JSON strings (with escapes) are ignored.
fn top_level_object_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if depth == 0 {
            if ch == '{' {
                depth = 1;
                start = i;
                in_string = false;
                escape_next = false;
            }
            continue;
        }
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    spans.push((start, i + 1));
                }
            }
            _ => {}
        }
    }

    spans
}
