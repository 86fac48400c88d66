//! Lenient reading of ids and text out of loosely typed wire values.
//!
//! Listing endpoints sometimes populate references (`usuarioId` as a whole
//! user document) or send numeric ids. These helpers read what they can and
//! yield `None` for the rest, so one odd field never drops a whole record.

use serde_json::Value;

/// Read an id: strings as given, numbers in their decimal form, objects
/// through their `_id`. Blank strings and anything else are `None`.
#[must_use]
pub fn lenient_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_owned),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("_id").and_then(lenient_id),
        _ => None,
    }
}

/// Read non-empty text. Non-string values are `None`.
#[must_use]
pub fn lenient_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}
