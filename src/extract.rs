//! # Structured-Text Extractor
//!
//! Turns a model's free-text reply into a JSON object. Model output is
//! often wrapped in markdown fences or cut off by the token budget, so
//! parsing walks a ladder of cheap repairs before a brute-force scan, and
//! never fails: when nothing parses the caller's fallback comes back.

use serde_json::Value;

/// Closers appended to a truncated reply, tried in order.
const CLOSING_SUFFIXES: [&str; 8] = ["}]}}", "}]}", "]}}", "]}", "}}", "}]", "}", "]"];

/// Variants that also terminate an open string literal.
const STRING_CLOSING_SUFFIXES: [&str; 4] = ["\"}]}}", "\"}]}", "\"]}}", "\"]}"];

/// Parse `text` into a JSON object, or return `fallback` unchanged.
pub fn parse(text: &str, fallback: Value) -> Value {
    parse_object(text).unwrap_or(fallback)
}

/// Parse `text` into a JSON object if any repair strategy succeeds.
pub fn parse_object(text: &str) -> Option<Value> {
    let body = unfence(text).trim();

    if let Some(value) = try_object(body) {
        return Some(value);
    }

    for suffix in CLOSING_SUFFIXES.iter().chain(STRING_CLOSING_SUFFIXES.iter()) {
        let candidate = format!("{}{}", body, suffix);
        if let Some(value) = try_object(&candidate) {
            return Some(value);
        }
    }

    scan_truncations(body)
}

/// Content of the first ```json fence, else of the first generic fence,
/// else the text itself. An unclosed fence runs to the end of the text.
fn unfence(text: &str) -> &str {
    let opener = if text.contains("```json") {
        "```json"
    } else if text.contains("```") {
        "```"
    } else {
        return text;
    };

    let Some(start) = text.find(opener) else {
        return text;
    };
    let rest = &text[start + opener.len()..];
    match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    }
}

fn try_object(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

/// From the first `{`, try every prefix ending in `}`, longest first.
///
/// A JSON object always ends with `}`, so other cut points cannot parse.
fn scan_truncations(body: &str) -> Option<Value> {
    let start = body.find('{')?;
    let tail = &body[start..];

    tail.char_indices()
        .rev()
        .filter(|(_, c)| *c == '}')
        .find_map(|(idx, _)| try_object(&tail[..=idx]))
}

/// Coercions from loosely-typed model JSON into the shapes the stages use.
///
/// Models put numbers where strings belong, single strings where lists
/// belong, and nulls everywhere; these helpers absorb all of that.
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Render any scalar as text; arrays join with "; ".
    pub fn value_to_string(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(items) => items
                .iter()
                .map(value_to_string)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("; "),
            Value::Object(_) => value.to_string(),
        }
    }

    /// A list of non-empty strings from an array, a lone string, or nothing.
    pub fn string_list(value: &Value) -> Vec<String> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| value_to_string(item).trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        }
    }

    /// A number, or a string holding one.
    pub fn number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value_to_string(&value))
    }

    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let text = value_to_string(&value);
        Ok(if text.trim().is_empty() { None } else { Some(text) })
    }
}
