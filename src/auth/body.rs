//! Best-effort decoding of inbound request bodies.
//!
//! Clients are not guaranteed to send well-formed JSON, or anything at all.
//! An absent body becomes [`Body::Empty`] so downstream validation can report
//! missing fields, while bytes that fail to decode surface as the distinct
//! [`Body::Malformed`] outcome instead of being conflated with "empty".

use serde_json::{Map, Value};

/// Result of normalizing raw body bytes.
#[derive(Debug, PartialEq)]
pub enum Body {
    /// Bytes decoded to a JSON object.
    Fields(Map<String, Value>),
    /// No bytes, or whitespace only.
    Empty,
    /// Bytes present but not a JSON object.
    Malformed,
}

/// Normalize accumulated body bytes into a field mapping.
pub fn normalize(bytes: &[u8]) -> Body {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Body::Empty;
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Body::Fields(map),
        // Valid JSON that isn't an object carries no fields either.
        Ok(_) | Err(_) => Body::Malformed,
    }
}

/// Non-empty trimmed string value for `key`, or `None`.
///
/// Absent keys, blank strings, and non-string values all count as missing.
pub fn str_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
