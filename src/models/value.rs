//! Typed cell values produced by the cleaner

use chrono::NaiveDateTime;
use serde_json::Value;

/// Serialization format for timestamps written back to JSON
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A single typed field of a cleaned record
///
/// Declared columns always hold one of the scalar variants after cleaning.
/// `Raw` keeps undeclared fields (e.g. the entry tag list) available to the
/// derived table builders; it is never projected into a [`TypedTable`].
///
/// [`TypedTable`]: crate::models::TypedTable
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Raw(Value),
}

impl CellValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Integer(i) => Some(*i),
            CellValue::Raw(value) => value.as_i64(),
            _ => None,
        }
    }

    /// Convert back to JSON, e.g. when a derived table is fed to the cleaner again
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::Integer(i) => Value::from(*i),
            CellValue::Real(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Text(s) => Value::String(s.clone()),
            CellValue::Boolean(b) => Value::Bool(*b),
            CellValue::Timestamp(ts) => Value::String(ts.format(TIMESTAMP_FORMAT).to_string()),
            CellValue::Raw(value) => value.clone(),
        }
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Real(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::Timestamp(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

#[cfg(feature = "duckdb-backend")]
impl duckdb::ToSql for CellValue {
    fn to_sql(&self) -> duckdb::Result<duckdb::types::ToSqlOutput<'_>> {
        use duckdb::types::{TimeUnit, ToSqlOutput, Value as DbValue};

        let value = match self {
            CellValue::Null => DbValue::Null,
            CellValue::Integer(i) => DbValue::BigInt(*i),
            CellValue::Real(f) => DbValue::Double(*f),
            CellValue::Text(s) => DbValue::Text(s.clone()),
            CellValue::Boolean(b) => DbValue::Boolean(*b),
            CellValue::Timestamp(ts) => {
                DbValue::Timestamp(TimeUnit::Microsecond, ts.and_utc().timestamp_micros())
            }
            CellValue::Raw(Value::Null) => DbValue::Null,
            CellValue::Raw(value) => DbValue::Text(value.to_string()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}
