//! Table models: declared schemas, raw backup tables and typed output tables

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::column::ColumnSpec;
use super::value::CellValue;

/// A loosely-typed record as decoded from the backup JSON
pub type RawRecord = Map<String, Value>;

/// Ordered column declarations for a named table
///
/// Column order defines both the output column order and the storage typing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Column names in declared order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn timestamp_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.is_timestamp())
    }
}

/// A table as it appears in the decoded backup document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub name: String,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }

    /// Build a raw table from a JSON value that must be an array of objects
    pub fn from_value(name: impl Into<String>, value: Value) -> Result<Self, String> {
        let name = name.into();
        let Value::Array(items) = value else {
            return Err(format!("table '{}' is not an array of records", name));
        };

        let mut records = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match item {
                Value::Object(map) => records.push(map),
                other => {
                    return Err(format!(
                        "record {} of table '{}' is not an object: {}",
                        index, name, other
                    ));
                }
            }
        }

        Ok(Self { name, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A schema-conforming table, ready for the loader
///
/// Every row holds exactly one value per schema column, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedTable {
    pub name: String,
    pub schema: TableSchema,
    pub rows: Vec<Vec<CellValue>>,
}

impl TypedTable {
    /// Create a typed table, checking every row against the schema width
    pub fn new(
        name: impl Into<String>,
        schema: TableSchema,
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self, String> {
        let name = name.into();
        let width = schema.columns.len();
        if let Some(index) = rows.iter().position(|row| row.len() != width) {
            return Err(format!(
                "row {} of table '{}' has {} values, schema declares {}",
                index,
                name,
                rows[index].len(),
                width
            ));
        }
        Ok(Self { name, schema, rows })
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema.column_names()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a value by row index and column name
    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        let index = self.schema.columns.iter().position(|c| c.name == column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }
}
