//! Schema-driven cleaning of raw backup tables
//!
//! Cleaning happens in three passes over each record:
//!
//! 1. **Date normalization**: every declared timestamp column has its sentinel
//!    values masked and is converted to a timestamp. Columns in the rename map
//!    (`createdAt`, `datetime`, `created_at`, `end_date`) also produce a
//!    companion column holding the same instant truncated to midnight.
//! 2. **Enrichment**: custom mood definitions gain `mood_value` and default
//!    names for the built-in mood groups.
//! 3. **Typing**: every declared column present in the record is coerced to
//!    its declared type. Undeclared fields stay as [`CellValue::Raw`].
//!
//! The result is a [`CleanedTable`], which still carries undeclared fields for
//! the derived table builders. [`CleanedTable::project`] produces the
//! [`TypedTable`] that is handed to the store.

use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDateTime, NaiveTime};
use serde_json::Value;

use super::coerce::{coerce_cell, numeric_value, to_timestamp};
use crate::catalog::SchemaCatalog;
use crate::config::TablesSection;
use crate::error::{EtlError, EtlResult};
use crate::models::{CellValue, ColumnType, RawTable, TableRole, TableSchema, TypedTable};

/// Raw timestamp columns and the normalized-date column each one produces
pub const DATE_RENAMES: &[(&str, &str)] = &[
    ("createdAt", "date"),
    ("datetime", "date"),
    ("created_at", "date"),
    ("end_date", "date_end"),
];

/// Default names for the built-in mood groups, whose names are blank in backups
const DEFAULT_MOOD_NAMES: &[(i64, &str)] = &[(2, "Good"), (3, "Meh"), (4, "Bad")];

/// A record in the middle of cleaning: field name to value
pub type WorkingRecord = BTreeMap<String, CellValue>;

/// Companion column a raw timestamp column is normalized into, if any
pub fn derived_date_column(column: &str) -> Option<&'static str> {
    DATE_RENAMES
        .iter()
        .find(|(source, _)| *source == column)
        .map(|(_, target)| *target)
}

/// Cleaner output: declared columns typed, undeclared fields kept raw
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedTable {
    pub name: String,
    pub role: TableRole,
    pub schema: TableSchema,
    pub records: Vec<WorkingRecord>,
}

impl CleanedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep exactly the declared columns, in declared order
    ///
    /// A declared column that no record carries is a [`EtlError::SchemaMismatch`];
    /// a record that merely lacks a value gets null.
    pub fn project(&self) -> EtlResult<TypedTable> {
        if !self.records.is_empty() {
            if let Some(missing) = self
                .schema
                .columns
                .iter()
                .find(|column| !self.records.iter().any(|r| r.contains_key(&column.name)))
            {
                return Err(EtlError::SchemaMismatch {
                    table: self.name.clone(),
                    column: missing.name.clone(),
                });
            }
        }

        let rows = self
            .records
            .iter()
            .map(|record| {
                self.schema
                    .columns
                    .iter()
                    .map(|column| record.get(&column.name).cloned().unwrap_or(CellValue::Null))
                    .collect()
            })
            .collect();

        TypedTable::new(self.name.clone(), self.schema.clone(), rows).map_err(EtlError::InvalidSchema)
    }
}

/// Cleans raw tables against the schema catalog
///
/// Stateless apart from borrowed configuration; one instance serves a whole run.
#[derive(Debug, Clone, Copy)]
pub struct TableCleaner<'a> {
    catalog: &'a SchemaCatalog,
    tables: &'a TablesSection,
}

impl<'a> TableCleaner<'a> {
    pub fn new(catalog: &'a SchemaCatalog, tables: &'a TablesSection) -> Self {
        Self { catalog, tables }
    }

    pub fn catalog(&self) -> &'a SchemaCatalog {
        self.catalog
    }

    pub fn tables(&self) -> &'a TablesSection {
        self.tables
    }

    /// Clean a raw table using its catalog schema
    pub fn clean(&self, raw: &RawTable) -> EtlResult<CleanedTable> {
        let schema = self.catalog.schema(&raw.name)?;
        let role = self.tables.role_of(&raw.name);
        tracing::debug!(
            "Cleaning table '{}' ({} records, role {})",
            raw.name,
            raw.len(),
            role
        );
        Ok(clean_records(raw, schema, role))
    }

    /// Clean and project in one step
    pub fn clean_typed(&self, raw: &RawTable) -> EtlResult<TypedTable> {
        self.clean(raw)?.project()
    }
}

/// Clean every record of `raw` against `schema`
pub fn clean_records(raw: &RawTable, schema: &TableSchema, role: TableRole) -> CleanedTable {
    let derived_targets: HashSet<&str> = schema
        .timestamp_columns()
        .filter_map(|column| derived_date_column(&column.name))
        .collect();

    let records = raw
        .records
        .iter()
        .map(|fields| {
            let mut record: WorkingRecord = fields
                .iter()
                .map(|(name, value)| (name.clone(), CellValue::Raw(value.clone())))
                .collect();

            normalize_dates(&mut record, schema, role, &derived_targets);
            if role == TableRole::CustomMoods {
                enrich_custom_mood(&mut record);
            }
            apply_declared_types(&mut record, schema);
            record
        })
        .collect();

    CleanedTable {
        name: raw.name.clone(),
        role,
        schema: schema.clone(),
        records,
    }
}

/// Clean a raw table and project it, without catalog lookup
pub fn clean_table(raw: &RawTable, schema: &TableSchema, role: TableRole) -> EtlResult<TypedTable> {
    clean_records(raw, schema, role).project()
}

fn is_sentinel(value: &Value, role: TableRole) -> bool {
    match numeric_value(value) {
        Some(n) if n == 0.0 => true,
        Some(n) if n == -1.0 => role == TableRole::Goals,
        _ => false,
    }
}

/// Mask sentinels and convert one timestamp cell
fn normalize_timestamp(cell: &CellValue, role: TableRole) -> CellValue {
    match cell {
        CellValue::Raw(value) if is_sentinel(value, role) => CellValue::Null,
        CellValue::Raw(value) => to_timestamp(value).into(),
        CellValue::Timestamp(_) | CellValue::Null => cell.clone(),
        other => coerce_cell(other, ColumnType::Timestamp),
    }
}

fn midnight(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date().and_time(NaiveTime::MIN)
}

fn normalize_dates(
    record: &mut WorkingRecord,
    schema: &TableSchema,
    role: TableRole,
    derived_targets: &HashSet<&str>,
) {
    // Rename-map sources first, so their companions are not re-coerced below
    for column in schema.timestamp_columns() {
        let Some(target) = derived_date_column(&column.name) else {
            continue;
        };
        let Some(cell) = record.get(&column.name) else {
            continue;
        };
        let normalized = normalize_timestamp(cell, role);
        let date = match &normalized {
            CellValue::Timestamp(ts) => CellValue::Timestamp(midnight(*ts)),
            _ => CellValue::Null,
        };
        record.insert(column.name.clone(), normalized);
        record.insert(target.to_string(), date);
    }

    for column in schema.timestamp_columns() {
        if derived_date_column(&column.name).is_some()
            || derived_targets.contains(column.name.as_str())
        {
            continue;
        }
        if let Some(cell) = record.get(&column.name) {
            let normalized = normalize_timestamp(cell, role);
            record.insert(column.name.clone(), normalized);
        }
    }
}

fn integer_field(record: &WorkingRecord, name: &str) -> Option<i64> {
    record
        .get(name)
        .and_then(|cell| coerce_cell(cell, ColumnType::Integer).as_i64())
}

fn enrich_custom_mood(record: &mut WorkingRecord) {
    if !record.contains_key("mood_group_id") {
        return;
    }
    let group_id = integer_field(record, "mood_group_id");
    record.insert(
        "mood_value".to_string(),
        group_id.map(|id| 6 - id).into(),
    );

    let Some(group_id) = group_id else {
        return;
    };
    if integer_field(record, "mood_group_order") != Some(0) {
        return;
    }
    if let Some((_, name)) = DEFAULT_MOOD_NAMES.iter().find(|(id, _)| *id == group_id) {
        record.insert("custom_name".to_string(), CellValue::Text((*name).to_string()));
    }
}

fn apply_declared_types(record: &mut WorkingRecord, schema: &TableSchema) {
    for column in &schema.columns {
        if let Some(cell) = record.get_mut(&column.name) {
            *cell = coerce_cell(cell, column.target_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnSpec;
    use chrono::NaiveDate;
    use serde_json::json;

    fn raw(name: &str, value: Value) -> RawTable {
        RawTable::from_value(name, value).unwrap()
    }

    fn goals_schema() -> TableSchema {
        TableSchema::new(
            "goals",
            vec![
                ColumnSpec::new("goal_id", ColumnType::Integer, "key"),
                ColumnSpec::new("created_at", ColumnType::Timestamp, "time"),
                ColumnSpec::new("end_date", ColumnType::Timestamp, "time"),
                ColumnSpec::new("date", ColumnType::Timestamp, "time"),
                ColumnSpec::new("date_end", ColumnType::Timestamp, "time"),
            ],
        )
    }

    fn moods_schema() -> TableSchema {
        TableSchema::new(
            "customMoods",
            vec![
                ColumnSpec::new("id", ColumnType::Integer, "key"),
                ColumnSpec::new("custom_name", ColumnType::Text, "attribute"),
                ColumnSpec::new("mood_group_id", ColumnType::Integer, "dimension"),
                ColumnSpec::new("mood_group_order", ColumnType::Integer, "attribute"),
                ColumnSpec::new("mood_value", ColumnType::Integer, "measure"),
            ],
        )
    }

    fn at(y: i32, m: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_goal_sentinels_are_masked() {
        let table = raw(
            "goals",
            json!([
                {"goal_id": 1, "created_at": 1_704_462_300_000_i64, "end_date": -1},
                {"goal_id": 2, "created_at": 0, "end_date": 1_704_462_300_000_i64}
            ]),
        );
        let typed = clean_table(&table, &goals_schema(), TableRole::Goals).unwrap();

        assert_eq!(
            typed.value(0, "created_at"),
            Some(&CellValue::Timestamp(at(2024, 1, 5, 13, 45)))
        );
        assert_eq!(
            typed.value(0, "date"),
            Some(&CellValue::Timestamp(at(2024, 1, 5, 0, 0)))
        );
        assert_eq!(typed.value(0, "end_date"), Some(&CellValue::Null));
        assert_eq!(typed.value(0, "date_end"), Some(&CellValue::Null));
        assert_eq!(typed.value(1, "created_at"), Some(&CellValue::Null));
        assert_eq!(typed.value(1, "date"), Some(&CellValue::Null));
        assert_eq!(
            typed.value(1, "date_end"),
            Some(&CellValue::Timestamp(at(2024, 1, 5, 0, 0)))
        );
    }

    #[test]
    fn test_minus_one_is_kept_outside_goals() {
        let schema = TableSchema::new(
            "dayEntries",
            vec![
                ColumnSpec::new("id", ColumnType::Integer, "key"),
                ColumnSpec::new("datetime", ColumnType::Timestamp, "time"),
                ColumnSpec::new("date", ColumnType::Timestamp, "time"),
            ],
        );
        let table = raw("dayEntries", json!([{"id": 1, "datetime": -1}]));
        let typed = clean_table(&table, &schema, TableRole::Entries).unwrap();

        let expected = at(1969, 12, 31, 23, 59) + chrono::Duration::milliseconds(59_999);
        assert_eq!(
            typed.value(0, "datetime"),
            Some(&CellValue::Timestamp(expected))
        );
        assert_eq!(
            typed.value(0, "date"),
            Some(&CellValue::Timestamp(at(1969, 12, 31, 0, 0)))
        );
    }

    #[test]
    fn test_non_renamed_timestamp_column_is_coerced() {
        let schema = TableSchema::new(
            "reminders",
            vec![
                ColumnSpec::new("id", ColumnType::Integer, "key"),
                ColumnSpec::new("fired_at", ColumnType::Timestamp, "time"),
            ],
        );
        let table = raw(
            "reminders",
            json!([{"id": 1, "fired_at": 1_704_462_300_000_i64}, {"id": 2, "fired_at": 0}]),
        );
        let typed = clean_table(&table, &schema, TableRole::Standard).unwrap();
        assert_eq!(
            typed.value(0, "fired_at"),
            Some(&CellValue::Timestamp(at(2024, 1, 5, 13, 45)))
        );
        assert_eq!(typed.value(1, "fired_at"), Some(&CellValue::Null));
    }

    #[test]
    fn test_mood_value_and_default_names() {
        let table = raw(
            "customMoods",
            json!([
                {"id": 1, "custom_name": "", "mood_group_id": 1, "mood_group_order": 0},
                {"id": 2, "custom_name": "", "mood_group_id": 2, "mood_group_order": 0},
                {"id": 3, "custom_name": "", "mood_group_id": 3, "mood_group_order": 0},
                {"id": 4, "custom_name": "", "mood_group_id": 4, "mood_group_order": 0},
                {"id": 5, "custom_name": "meh-ish", "mood_group_id": 3, "mood_group_order": 1},
                {"id": 6, "custom_name": "", "mood_group_id": 5, "mood_group_order": 0}
            ]),
        );
        let typed = clean_table(&table, &moods_schema(), TableRole::CustomMoods).unwrap();

        let values: Vec<_> = (0..typed.len())
            .map(|row| typed.value(row, "mood_value").cloned())
            .collect();
        assert_eq!(
            values,
            vec![5, 4, 3, 2, 3, 1]
                .into_iter()
                .map(|v| Some(CellValue::Integer(v)))
                .collect::<Vec<_>>()
        );

        let names: Vec<_> = (0..typed.len())
            .map(|row| typed.value(row, "custom_name").cloned())
            .collect();
        assert_eq!(names[0], Some(CellValue::Text(String::new())));
        assert_eq!(names[1], Some(CellValue::Text("Good".into())));
        assert_eq!(names[2], Some(CellValue::Text("Meh".into())));
        assert_eq!(names[3], Some(CellValue::Text("Bad".into())));
        assert_eq!(names[4], Some(CellValue::Text("meh-ish".into())));
        assert_eq!(names[5], Some(CellValue::Text(String::new())));
    }

    #[test]
    fn test_enrichment_only_for_custom_moods() {
        let table = raw(
            "customMoods",
            json!([{"id": 2, "custom_name": "", "mood_group_id": 2, "mood_group_order": 0}]),
        );
        let cleaned = clean_records(&table, &moods_schema(), TableRole::Standard);
        assert!(!cleaned.records[0].contains_key("mood_value"));
        assert!(matches!(
            cleaned.project(),
            Err(EtlError::SchemaMismatch { ref column, .. }) if column == "mood_value"
        ));
    }

    #[test]
    fn test_projection_order_and_extra_fields() {
        let schema = TableSchema::new(
            "tags",
            vec![
                ColumnSpec::new("name", ColumnType::Text, "attribute"),
                ColumnSpec::new("id", ColumnType::Integer, "key"),
            ],
        );
        let table = raw(
            "tags",
            json!([{"id": 1, "name": "work", "icon": 12}, {"id": "2"}]),
        );
        let cleaned = clean_records(&table, &schema, TableRole::Standard);
        assert_eq!(cleaned.records[0].get("icon"), Some(&CellValue::Raw(json!(12))));

        let typed = cleaned.project().unwrap();
        assert_eq!(typed.column_names(), vec!["name", "id"]);
        assert_eq!(
            typed.rows[0],
            vec![CellValue::Text("work".into()), CellValue::Integer(1)]
        );
        assert_eq!(typed.rows[1], vec![CellValue::Null, CellValue::Integer(2)]);
    }

    #[test]
    fn test_missing_declared_column() {
        let table = raw("goals", json!([{"goal_id": 1}]));
        let err = clean_table(&table, &goals_schema(), TableRole::Goals).unwrap_err();
        assert!(matches!(err, EtlError::SchemaMismatch { ref column, .. } if column == "created_at"));
    }

    #[test]
    fn test_empty_table_projects_to_empty() {
        let table = raw("goals", json!([]));
        let typed = clean_table(&table, &goals_schema(), TableRole::Goals).unwrap();
        assert!(typed.is_empty());
        assert_eq!(typed.column_names().len(), 5);
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let table = raw(
            "customMoods",
            json!([{"id": 2, "custom_name": "", "mood_group_id": 2, "mood_group_order": 0}]),
        );
        let first = clean_table(&table, &moods_schema(), TableRole::CustomMoods).unwrap();

        let records: Vec<Value> = first
            .rows
            .iter()
            .map(|row| {
                let map = first
                    .column_names()
                    .into_iter()
                    .zip(row)
                    .map(|(name, cell)| (name.to_string(), cell.to_json()))
                    .collect::<serde_json::Map<_, _>>();
                Value::Object(map)
            })
            .collect();
        let again = clean_table(
            &raw("customMoods", Value::Array(records)),
            &moods_schema(),
            TableRole::CustomMoods,
        )
        .unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_cleaner_unknown_table() {
        let catalog = SchemaCatalog::from_schemas([goals_schema()]);
        let tables = TablesSection::default();
        let cleaner = TableCleaner::new(&catalog, &tables);

        let err = cleaner.clean(&raw("moods", json!([]))).unwrap_err();
        assert!(matches!(err, EtlError::UnknownTable(ref name) if name == "moods"));
    }
}
