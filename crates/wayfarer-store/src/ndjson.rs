//! Line-delimited JSON codec shared by both stores.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{Entry, Key};

/// Decode a store body. Invalid UTF-8 becomes U+FFFD; a replacement never
/// swallows a `\n`, so line positions and keys are unchanged.
#[must_use]
pub fn decode(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Record lines of `content`: blank and whitespace-only lines are skipped and
/// a trailing `\r` is dropped. Index in the result is the record key.
#[must_use]
pub fn record_lines(content: &str) -> Vec<&str> {
    content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Parse one record line. Anything other than a JSON object is malformed.
#[must_use]
pub fn parse_line(key: Key, line: &str) -> Entry<Map<String, Value>> {
    let malformed = |reason: String| Entry::Malformed {
        key,
        line: key + 1,
        raw: line.to_string(),
        reason,
    };
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(value)) => Entry::Valid { key, value },
        Ok(other) => malformed(format!("expected a JSON object, found {}", kind(&other))),
        Err(e) => malformed(e.to_string()),
    }
}

/// Parse every record in `content`, in order.
#[must_use]
pub fn parse_records(content: &str) -> Vec<Entry<Map<String, Value>>> {
    record_lines(content)
        .into_iter()
        .enumerate()
        .map(|(key, line)| parse_line(key, line))
        .collect()
}

/// Encode `value` as a single line, without the terminator.
///
/// # Errors
///
/// Propagates serialization failures.
pub fn encode_line<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    // Compact output escapes embedded newlines, so one value is one line
    serde_json::to_string(value)
}

/// Encode a whole store body, one record per line with a trailing newline.
///
/// # Errors
///
/// Propagates serialization failures.
pub fn encode_records<T: Serialize>(records: &[T]) -> Result<String, serde_json::Error> {
    let mut body = String::new();
    for record in records {
        body.push_str(&encode_line(record)?);
        body.push('\n');
    }
    Ok(body)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
