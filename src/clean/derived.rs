//! Auxiliary tables derived from cleaned backup data and static reference files

use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde_json::{Map, Value, json};

use super::cleaner::{CleanedTable, TableCleaner};
use super::coerce::{coerce_json, from_epoch_millis, numeric_value};
use crate::error::{EtlError, EtlResult};
use crate::models::{
    CellValue, ColumnSpec, ColumnType, RawRecord, RawTable, TableRole, TableSchema, TypedTable,
};

/// Name of the rolling calendar table
pub const CALENDAR_TABLE: &str = "calendar";

/// Tag value recorded for entries without tags
const NO_TAG: i64 = 0;

fn tag_values(tags: Option<&CellValue>) -> Vec<Value> {
    let list = match tags {
        None | Some(CellValue::Null) => Value::Null,
        Some(CellValue::Text(text)) => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
        Some(other) => other.to_json(),
    };

    let tags: Vec<Value> = match list {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        scalar => vec![scalar],
    };

    if tags.is_empty() {
        return vec![json!(NO_TAG)];
    }
    tags.into_iter()
        .map(|tag| if tag.is_null() { json!(NO_TAG) } else { tag })
        .collect()
}

/// Explode the tag list of each day entry into `{entry_id, tag}` records
///
/// Entries with no tags still produce one record, tagged `0`. The result is
/// cleaned against the `entry_tags` catalog schema.
pub fn build_entry_tags(
    entries: &CleanedTable,
    cleaner: &TableCleaner<'_>,
) -> EtlResult<CleanedTable> {
    let tables = cleaner.tables();
    if entries.role != TableRole::Entries {
        return Err(EtlError::WrongSourceTable {
            target: tables.entry_tags.clone(),
            expected: tables.entries.clone(),
            found: entries.name.clone(),
        });
    }

    let mut records: Vec<RawRecord> = Vec::new();
    for entry in &entries.records {
        let entry_id = entry.get("id").map(CellValue::to_json).unwrap_or(Value::Null);
        for tag in tag_values(entry.get("tags")) {
            let mut record = Map::new();
            record.insert("entry_id".to_string(), entry_id.clone());
            record.insert("tag".to_string(), tag);
            records.push(record);
        }
    }

    tracing::debug!(
        "Exploded {} entries into {} entry tags",
        entries.len(),
        records.len()
    );
    cleaner.clean(&RawTable::new(tables.entry_tags.clone(), records))
}

/// Load and clean the static mood group reference table
pub fn load_mood_groups(path: &Path, cleaner: &TableCleaner<'_>) -> EtlResult<CleanedTable> {
    if !path.exists() {
        tracing::error!("Mood groups file {} does not exist", path.display());
        return Err(EtlError::MissingFile(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| EtlError::io(path, e))?;
    let value: Value = serde_json::from_str(&content).map_err(|e| EtlError::json(path, e))?;
    let raw = RawTable::from_value(cleaner.tables().mood_groups.clone(), value)
        .map_err(EtlError::DecodeError)?;
    cleaner.clean(&raw)
}

/// Fixed layout of the preferences snapshot table
pub fn prefs_schema(name: &str) -> TableSchema {
    TableSchema::new(
        name,
        vec![
            ColumnSpec::new("AUTO_BACKUP_IS_ON", ColumnType::Boolean, "attribute"),
            ColumnSpec::new("LAST_DAYS_IN_ROWS_NUMBER", ColumnType::Integer, "measure"),
            ColumnSpec::new("DAYS_IN_ROW_LONGEST_CHAIN", ColumnType::Integer, "measure"),
            ColumnSpec::new("LAST_ENTRY_CREATION_TIME", ColumnType::Timestamp, "time"),
        ],
    )
}

/// Turn the backup's `{key, value}` preference records into a one-row table
///
/// Keys that are absent become null. The creation time is epoch milliseconds.
pub fn prefs_snapshot(prefs: &RawTable) -> EtlResult<TypedTable> {
    let schema = prefs_schema(&prefs.name);
    let lookup = |key: &str| -> Option<&Value> {
        prefs
            .records
            .iter()
            .find(|record| record.get("key").and_then(Value::as_str) == Some(key))
            .and_then(|record| record.get("value"))
    };

    let row = schema
        .columns
        .iter()
        .map(|column| match lookup(&column.name) {
            None => CellValue::Null,
            Some(value) if column.target_type == ColumnType::Timestamp => {
                numeric_value(value).and_then(from_epoch_millis).into()
            }
            Some(value) => coerce_json(value, column.target_type),
        })
        .collect();

    TypedTable::new(prefs.name.clone(), schema, vec![row]).map_err(EtlError::InvalidSchema)
}

/// Fixed layout of the rolling calendar table
pub fn calendar_schema() -> TableSchema {
    TableSchema::new(
        CALENDAR_TABLE,
        vec![
            ColumnSpec::new("TimeStamp", ColumnType::Timestamp, "time"),
            ColumnSpec::new("Date", ColumnType::Timestamp, "time"),
            ColumnSpec::new("Day", ColumnType::Text, "attribute"),
            ColumnSpec::new("DayName", ColumnType::Text, "attribute"),
            ColumnSpec::new("Week", ColumnType::Integer, "attribute"),
            ColumnSpec::new("Month", ColumnType::Integer, "attribute"),
            ColumnSpec::new("MonthName", ColumnType::Text, "attribute"),
            ColumnSpec::new("Quarter", ColumnType::Integer, "attribute"),
            ColumnSpec::new("Year", ColumnType::Integer, "attribute"),
            ColumnSpec::new("MonthYear", ColumnType::Text, "attribute"),
            ColumnSpec::new("QuarterYear", ColumnType::Text, "attribute"),
            ColumnSpec::new("IsWeekend", ColumnType::Boolean, "attribute"),
            ColumnSpec::new("IsWeekday", ColumnType::Boolean, "attribute"),
        ],
    )
}

fn calendar_row(day: NaiveDate) -> Vec<CellValue> {
    let stamp = day.and_time(NaiveTime::MIN);
    let weekday = day.weekday().num_days_from_sunday();
    let quarter = (day.month() - 1) / 3 + 1;
    let is_weekend = weekday == 0 || weekday == 6;
    let month_name = day.format("%B").to_string();

    vec![
        CellValue::Timestamp(stamp),
        CellValue::Timestamp(stamp),
        CellValue::Text(weekday.to_string()),
        CellValue::Text(day.format("%A").to_string()),
        CellValue::Integer(i64::from(day.iso_week().week())),
        CellValue::Integer(i64::from(day.month())),
        CellValue::Text(month_name.clone()),
        CellValue::Integer(i64::from(quarter)),
        CellValue::Integer(i64::from(day.year())),
        CellValue::Text(format!("{}-{}", month_name, day.year())),
        CellValue::Text(format!("Q{}-{}", quarter, day.year())),
        CellValue::Boolean(is_weekend),
        CellValue::Boolean(!is_weekend),
    ]
}

/// One row per day from `start` to `end` inclusive
pub fn build_calendar(start: NaiveDate, end: NaiveDate) -> EtlResult<TypedTable> {
    let rows = start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(calendar_row)
        .collect();
    TypedTable::new(CALENDAR_TABLE, calendar_schema(), rows).map_err(EtlError::InvalidSchema)
}
