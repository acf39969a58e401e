//! Signal value coercion
//!
//! Host values are raw JSON. Rules only ever look at them through the helpers
//! here: as a signal bit, as a number, or as a literal parsed from a term.

use serde_json::Value;

/// Interpret a value as a signal bit
///
/// Accepts the numbers 0 and 1, booleans, and the strings "0" and "1".
/// Anything else is not a bit.
pub fn signal_bit(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => Some(false),
            Some(f) if f == 1.0 => Some(true),
            _ => None,
        },
        Value::String(s) => match s.as_str() {
            "0" => Some(false),
            "1" => Some(true),
            _ => None,
        },
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Numeric view of a value, if it has one
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => parse_number(s),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub(crate) fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Text view of a value (strings unquoted, everything else as JSON)
pub fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truthiness of a host value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Parse a term literal
///
/// Numbers, booleans and `null` become the corresponding JSON value; any other
/// text is kept as a string.
pub fn parse_literal(s: &str) -> Value {
    match serde_json::from_str::<Value>(s) {
        Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => v,
        _ => Value::String(s.to_string()),
    }
}

/// Whether a host value matches a term literal
pub fn matches_literal(value: &Value, literal: &str) -> bool {
    *value == parse_literal(literal) || text(value) == literal
}
