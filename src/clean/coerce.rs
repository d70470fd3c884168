//! Scalar coercion from loosely-typed JSON into declared column types

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::{CellValue, ColumnType};

static RE_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("Invalid regex"));

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Numeric value of a number or numeric string
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if RE_NUMERIC.is_match(s) {
                s.parse::<f64>().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Interpret epoch milliseconds as UTC wall-clock time
pub fn from_epoch_millis(millis: f64) -> Option<NaiveDateTime> {
    if !millis.is_finite() {
        return None;
    }
    let micros = (millis * 1000.0).round();
    if micros.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros as i64).map(|dt| dt.naive_utc())
}

/// Parse a date-time string in one of the accepted layouts
pub fn parse_datetime_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Convert a raw JSON value to a timestamp
///
/// Numbers and numeric strings are epoch milliseconds; other strings must be
/// a recognised date-time layout. Everything else is null.
pub fn to_timestamp(value: &Value) -> Option<NaiveDateTime> {
    if let Some(millis) = numeric_value(value) {
        return from_epoch_millis(millis);
    }
    match value {
        Value::String(s) => parse_datetime_str(s),
        _ => None,
    }
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| numeric_value(value).and_then(integral)),
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn to_real(value: &Value) -> Option<f64> {
    numeric_value(value)
}

fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn to_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Coerce a raw JSON value to the declared column type; failures become null
pub fn coerce_json(value: &Value, target: ColumnType) -> CellValue {
    match target {
        ColumnType::Timestamp => to_timestamp(value).into(),
        ColumnType::Integer => to_integer(value).into(),
        ColumnType::Real => to_real(value).into(),
        ColumnType::Text => to_text(value).into(),
        ColumnType::Boolean => to_boolean(value).into(),
    }
}

/// Coerce a working cell to the declared column type
pub fn coerce_cell(cell: &CellValue, target: ColumnType) -> CellValue {
    match (cell, target) {
        (CellValue::Null, _) => CellValue::Null,
        (CellValue::Raw(value), _) => coerce_json(value, target),
        (CellValue::Timestamp(_), ColumnType::Timestamp)
        | (CellValue::Integer(_), ColumnType::Integer)
        | (CellValue::Real(_), ColumnType::Real)
        | (CellValue::Text(_), ColumnType::Text)
        | (CellValue::Boolean(_), ColumnType::Boolean) => cell.clone(),
        (CellValue::Timestamp(ts), ColumnType::Integer) => {
            CellValue::Integer(ts.and_utc().timestamp_millis())
        }
        (other, _) => coerce_json(&other.to_json(), target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_epoch_millis_are_utc() {
        assert_eq!(
            to_timestamp(&json!(1_704_067_200_000_i64)),
            Some(ts(2024, 1, 1, 0, 0, 0))
        );
        assert_eq!(
            to_timestamp(&json!("1704067200000")),
            Some(ts(2024, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_timestamp_strings() {
        assert_eq!(
            to_timestamp(&json!("2024-01-05T13:45:10")),
            Some(ts(2024, 1, 5, 13, 45, 10))
        );
        assert_eq!(
            to_timestamp(&json!("2024-01-05 13:45:10.500")).map(|t| t.date()),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(
            to_timestamp(&json!("2024-01-05T13:45:10Z")),
            Some(ts(2024, 1, 5, 13, 45, 10))
        );
        assert_eq!(
            to_timestamp(&json!("2024-01-05")),
            Some(ts(2024, 1, 5, 0, 0, 0))
        );
        assert_eq!(to_timestamp(&json!("yesterday")), None);
        assert_eq!(to_timestamp(&json!(true)), None);
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(coerce_json(&json!(4), ColumnType::Integer), CellValue::Integer(4));
        assert_eq!(coerce_json(&json!(4.0), ColumnType::Integer), CellValue::Integer(4));
        assert_eq!(coerce_json(&json!("12"), ColumnType::Integer), CellValue::Integer(12));
        assert_eq!(coerce_json(&json!(true), ColumnType::Integer), CellValue::Integer(1));
        assert_eq!(coerce_json(&json!(4.5), ColumnType::Integer), CellValue::Null);
        assert_eq!(coerce_json(&json!("abc"), ColumnType::Integer), CellValue::Null);
        assert_eq!(coerce_json(&json!([1]), ColumnType::Integer), CellValue::Null);
    }

    #[test]
    fn test_text_coercion() {
        assert_eq!(
            coerce_json(&json!("note"), ColumnType::Text),
            CellValue::Text("note".into())
        );
        assert_eq!(coerce_json(&json!(7), ColumnType::Text), CellValue::Text("7".into()));
        assert_eq!(
            coerce_json(&json!([1, 2]), ColumnType::Text),
            CellValue::Text("[1,2]".into())
        );
        assert_eq!(coerce_json(&Value::Null, ColumnType::Text), CellValue::Null);
    }

    #[test]
    fn test_boolean_and_real_coercion() {
        assert_eq!(coerce_json(&json!(1), ColumnType::Boolean), CellValue::Boolean(true));
        assert_eq!(
            coerce_json(&json!("False"), ColumnType::Boolean),
            CellValue::Boolean(false)
        );
        assert_eq!(coerce_json(&json!("maybe"), ColumnType::Boolean), CellValue::Null);
        assert_eq!(coerce_json(&json!("2.5"), ColumnType::Real), CellValue::Real(2.5));
        assert_eq!(coerce_json(&json!(false), ColumnType::Real), CellValue::Null);
    }

    #[test]
    fn test_coerce_cell_keeps_typed_values() {
        let stamp = CellValue::Timestamp(ts(2024, 1, 5, 0, 0, 0));
        assert_eq!(coerce_cell(&stamp, ColumnType::Timestamp), stamp);
        assert_eq!(
            coerce_cell(&CellValue::Integer(3), ColumnType::Real),
            CellValue::Real(3.0)
        );
        assert_eq!(
            coerce_cell(&CellValue::Raw(json!("5")), ColumnType::Integer),
            CellValue::Integer(5)
        );
    }
}
