//! DuckDB store implementation
//!
//! Provides an embedded database for the cleaned mood and sleep tables.
//! Supports both file-based persistence and in-memory mode.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate};

use super::{
    QueryResult, StoreError, StoreResult, TableStore, create_table_sql, insert_sql,
    quote_identifier,
};
use crate::models::TypedTable;

/// DuckDB store
pub struct DuckDbStore {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDbStore {
    /// Open or create a file-based database
    pub fn new(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::IoError(format!("{}: {}", parent.display(), e)))?;
        }
        let connection = duckdb::Connection::open(&path)
            .map_err(|e| StoreError::ConnectionFailed(format!("Failed to open DuckDB: {}", e)))?;

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory database
    pub fn in_memory() -> StoreResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            StoreError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| StoreError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    fn insert_rows(conn: &duckdb::Connection, table: &TypedTable) -> StoreResult<usize> {
        let mut stmt = conn
            .prepare(&insert_sql(&table.name, &table.schema))
            .map_err(|e| StoreError::QueryFailed(format!("Prepare failed: {}", e)))?;

        for row in &table.rows {
            stmt.execute(duckdb::params_from_iter(row.iter()))
                .map_err(|e| {
                    StoreError::QueryFailed(format!("Insert into '{}' failed: {}", table.name, e))
                })?;
        }
        Ok(table.rows.len())
    }

    /// Convert a DuckDB row to a JSON value
    fn row_to_json(row: &duckdb::Row, columns: &[String]) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (i, col_name) in columns.iter().enumerate() {
            let value = match row.get_ref(i) {
                Ok(value_ref) => Self::value_ref_to_json(value_ref),
                Err(_) => serde_json::Value::Null,
            };
            map.insert(col_name.clone(), value);
        }
        serde_json::Value::Object(map)
    }

    /// Convert a DuckDB ValueRef to a JSON value
    fn value_ref_to_json(value: duckdb::types::ValueRef) -> serde_json::Value {
        use duckdb::types::{TimeUnit, ValueRef};

        match value {
            ValueRef::Null => serde_json::Value::Null,
            ValueRef::Boolean(b) => serde_json::Value::Bool(b),
            ValueRef::TinyInt(i) => i.into(),
            ValueRef::SmallInt(i) => i.into(),
            ValueRef::Int(i) => i.into(),
            ValueRef::BigInt(i) => i.into(),
            // i128 may not fit in a JSON number
            ValueRef::HugeInt(i) => serde_json::Value::String(i.to_string()),
            ValueRef::UTinyInt(i) => i.into(),
            ValueRef::USmallInt(i) => i.into(),
            ValueRef::UInt(i) => i.into(),
            ValueRef::UBigInt(i) => i.into(),
            ValueRef::Float(f) => serde_json::Number::from_f64(f as f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Double(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned().into(),
            ValueRef::Timestamp(unit, raw) => {
                let micros = match unit {
                    TimeUnit::Second => raw.saturating_mul(1_000_000),
                    TimeUnit::Millisecond => raw.saturating_mul(1_000),
                    TimeUnit::Microsecond => raw,
                    TimeUnit::Nanosecond => raw / 1_000,
                };
                DateTime::from_timestamp_micros(micros)
                    .map(|dt| dt.naive_utc().to_string().into())
                    .unwrap_or(serde_json::Value::Null)
            }
            ValueRef::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days.into())))
                .map(|d| d.to_string().into())
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Decimal(d) => serde_json::Value::String(d.to_string()),
            other => serde_json::Value::String(format!("{:?}", other)),
        }
    }
}

impl TableStore for DuckDbStore {
    fn replace_table(&self, table: &TypedTable) -> StoreResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::TransactionFailed(format!("Begin failed: {}", e)))?;

        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {}; {};",
            quote_identifier(&table.name),
            create_table_sql(&table.name, &table.schema, false)
        ))
        .map_err(|e| StoreError::QueryFailed(format!("Recreate '{}' failed: {}", table.name, e)))?;

        let written = Self::insert_rows(&tx, table)?;

        tx.commit()
            .map_err(|e| StoreError::TransactionFailed(format!("Commit failed: {}", e)))?;
        Ok(written)
    }

    fn append_table(&self, table: &TypedTable) -> StoreResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::TransactionFailed(format!("Begin failed: {}", e)))?;

        tx.execute_batch(&create_table_sql(&table.name, &table.schema, true))
            .map_err(|e| {
                StoreError::QueryFailed(format!("Create '{}' failed: {}", table.name, e))
            })?;
        let written = Self::insert_rows(&tx, table)?;

        tx.commit()
            .map_err(|e| StoreError::TransactionFailed(format!("Commit failed: {}", e)))?;
        Ok(written)
    }

    fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| StoreError::QueryFailed(format!("Batch execute failed: {}", e)))
    }

    fn execute_query(&self, sql: &str) -> StoreResult<QueryResult> {
        let start = std::time::Instant::now();
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| StoreError::QueryFailed(format!("Prepare failed: {}", e)))?;

        // Column metadata is only available once the statement has run
        let mut result_rows = stmt
            .query([])
            .map_err(|e| StoreError::QueryFailed(format!("Query failed: {}", e)))?;

        let column_count = result_rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                result_rows
                    .as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut rows = Vec::new();
        while let Some(row) = result_rows
            .next()
            .map_err(|e| StoreError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            rows.push(Self::row_to_json(row, &columns));
        }

        Ok(QueryResult {
            columns,
            rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn table_exists(&self, name: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                [name],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::QueryFailed(format!("Table lookup failed: {}", e)))?;
        Ok(count > 0)
    }

    fn row_count(&self, name: &str) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_identifier(name)),
                [],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::QueryFailed(format!("Count on '{}' failed: {}", name, e)))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }
}
