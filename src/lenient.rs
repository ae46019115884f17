//! Tolerant readers for loosely typed JSON and CSV values.
//!
//! Evidence rows and index metadata come from several writers, so the same field can show
//! up as `4`, `4.0`, `"4"` or `"NaN"`. These helpers read what is readable and map
//! everything else to `None` instead of rejecting the whole record.

use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

/// Finite float from a number or a numeric string.
pub fn value_as_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

/// Integer from an integer, a finite float (truncated), a numeric string or a boolean.
pub fn value_as_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        JsonValue::String(s) => parse_integral(s),
        JsonValue::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Boolean from a boolean or a number (non-zero is true).
pub fn value_as_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(|f| f != 0.0),
        _ => None,
    }
}

/// Scalar rendered as text. Null, `"NaN"` and containers are unknown.
pub fn value_as_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if s == "NaN" => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(_) | JsonValue::Bool(_) => Some(value.to_string()),
        _ => None,
    }
}

/// Integers may be written as `"3"` or `"3.0"` depending on the exporter.
pub fn parse_integral(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

fn read<'de, D, T>(
    deserializer: D,
    convert: fn(&JsonValue) -> Option<T>,
) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(convert))
}

pub fn opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    read(deserializer, value_as_f64)
}

pub fn opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    read(deserializer, value_as_i64)
}

pub fn opt_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    read(deserializer, value_as_bool)
}

pub fn opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    read(deserializer, value_as_string)
}

/// Non-negative count; anything unreadable counts as zero.
pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let value = read(deserializer, value_as_i64)?;
    Ok(value.map(|v| v.max(0) as usize).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_as_f64() {
        assert_eq!(value_as_f64(&json!(0.1)), Some(0.1));
        assert_eq!(value_as_f64(&json!(" 0.25 ")), Some(0.25));
        assert_eq!(value_as_f64(&json!("n/a")), None);
        assert_eq!(value_as_f64(&json!("NaN")), None);
        assert_eq!(value_as_f64(&json!(true)), None);
        assert_eq!(value_as_f64(&json!([1.0])), None);
    }

    #[test]
    fn test_value_as_i64() {
        assert_eq!(value_as_i64(&json!(4)), Some(4));
        assert_eq!(value_as_i64(&json!(4.0)), Some(4));
        assert_eq!(value_as_i64(&json!(4.7)), Some(4));
        assert_eq!(value_as_i64(&json!("5")), Some(5));
        assert_eq!(value_as_i64(&json!("5.0")), Some(5));
        assert_eq!(value_as_i64(&json!(true)), Some(1));
        assert_eq!(value_as_i64(&json!("many")), None);
        assert_eq!(value_as_i64(&json!({})), None);
    }

    #[test]
    fn test_value_as_string_and_bool() {
        assert_eq!(value_as_string(&json!("gmail.com")).as_deref(), Some("gmail.com"));
        assert_eq!(value_as_string(&json!(12)).as_deref(), Some("12"));
        assert_eq!(value_as_string(&json!("NaN")), None);
        assert_eq!(value_as_bool(&json!(1)), Some(true));
        assert_eq!(value_as_bool(&json!(0.0)), Some(false));
        assert_eq!(value_as_bool(&json!("yes")), None);
    }

    #[test]
    fn test_parse_integral() {
        assert_eq!(parse_integral("2987000"), Some(2987000));
        assert_eq!(parse_integral("1.0"), Some(1));
        assert_eq!(parse_integral(""), None);
        assert_eq!(parse_integral("inf"), None);
    }
}
