//! Field access helpers for opaque records.
//!
//! The handlers treat records as untyped bags; these helpers pull the few
//! fields the natural keys and column mappings need, tolerating both
//! native numbers and numeric strings.

use bramble_core::Record;
use serde_json::Value;

/// Integer field: accepts a JSON number or a digit string.
#[must_use]
pub fn as_i64(record: &Record, name: &str) -> Option<i64> {
    match record.get(name)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text field: accepts a string, number or boolean.
#[must_use]
pub fn as_text(record: &Record, name: &str) -> Option<String> {
    match record.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Composite field (array/object) serialized to a JSON string.
#[must_use]
pub fn as_json_text(record: &Record, name: &str) -> Option<String> {
    match record.get(name)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => serde_json::to_string(other).ok(),
    }
}
