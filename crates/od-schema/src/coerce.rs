//! Lenient scalar readers shared by validation and sanitization.
//!
//! Client payloads are allowed to carry numbers and booleans as strings
//! (`"1280"`, `"true"`); these helpers decide what such a value means.

use serde_json::Value;

/// Finite number, or a string that parses to one.
pub fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Whole number, from an integer, an integral float or a numeric string.
pub fn as_integer(value: &Value) -> Option<i64> {
    if let Value::Number(n) = value {
        if let Some(i) = n.as_i64() {
            return Some(i);
        }
        if n.is_u64() {
            return None;
        }
    }
    if let Value::String(s) = value {
        if let Ok(i) = s.parse::<i64>() {
            return Some(i);
        }
    }
    let number = as_number(value)?;
    let in_range = number >= i64::MIN as f64 && number <= i64::MAX as f64;
    (number.fract() == 0.0 && in_range).then_some(number as i64)
}

pub fn as_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Equality that treats `1` and `1.0` as the same number.
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
