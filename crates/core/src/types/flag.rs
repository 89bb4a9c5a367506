//! Lenient boolean decoding for backend payloads.
//!
//! The commerce backend serializes flags inconsistently: `true`, `1`, `"1"`
//! and `"true"` all appear in real pushes for the same field.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Interpret a JSON value as a flag.
///
/// Returns `None` for values that carry no boolean meaning (objects, arrays,
/// unrecognised strings) so the caller can fall back to a default.
#[must_use]
pub fn flag_from_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Serde adapter for `Option<bool>` fields that accepts any flag encoding.
///
/// Use with `#[serde(default, deserialize_with = "flag::lenient")]`.
///
/// # Errors
///
/// Only fails when the underlying JSON cannot be read.
pub fn lenient<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(flag_from_value))
}
