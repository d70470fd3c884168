//! Relational store abstraction and the table loader
//!
//! The pipeline only talks to the [`TableStore`] trait. DuckDB is the one
//! implementation, behind the `duckdb-backend` feature. Loading follows
//! replace semantics: a table is dropped, recreated from its schema and
//! filled, all inside one store transaction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDbStore;

use crate::models::{TableSchema, TypedTable};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to open the database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Statement or query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction could not be opened or committed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// A configured initialization script does not exist
    #[error("SQL script not found: {0}")]
    ScriptNotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Query result row as a JSON value
pub type QueryRow = serde_json::Value;

/// Query result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<QueryRow>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self {
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Relational store the loader writes into
pub trait TableStore {
    /// Drop, recreate and fill `table` in one transaction
    ///
    /// # Returns
    /// Number of rows written
    fn replace_table(&self, table: &TypedTable) -> StoreResult<usize>;

    /// Create `table` if missing, then insert its rows
    fn append_table(&self, table: &TypedTable) -> StoreResult<usize>;

    /// Execute one or more SQL statements that return no rows
    fn execute_batch(&self, sql: &str) -> StoreResult<()>;

    /// Execute a SQL query and return its rows as JSON
    fn execute_query(&self, sql: &str) -> StoreResult<QueryResult>;

    fn table_exists(&self, name: &str) -> StoreResult<bool>;

    fn row_count(&self, name: &str) -> StoreResult<usize>;

    /// Backend type name, e.g. "duckdb"
    fn backend_type(&self) -> &'static str;
}

/// Double-quote an identifier for use in generated SQL
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE` statement for a schema under the given table name
pub fn create_table_sql(name: &str, schema: &TableSchema, if_not_exists: bool) -> String {
    let columns: Vec<String> = schema
        .columns
        .iter()
        .map(|c| format!("{} {}", quote_identifier(&c.name), c.target_type.sql_type()))
        .collect();
    format!(
        "CREATE TABLE {}{} ({})",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        quote_identifier(name),
        columns.join(", ")
    )
}

/// Parameterized `INSERT` statement covering every schema column
pub fn insert_sql(name: &str, schema: &TableSchema) -> String {
    let columns: Vec<String> = schema
        .columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(name),
        columns.join(", "),
        placeholders
    )
}

/// Load a typed table with replace semantics
///
/// An empty table is logged and skipped, leaving existing content untouched.
pub fn load(store: &dyn TableStore, table: &TypedTable) -> StoreResult<usize> {
    if table.is_empty() {
        tracing::warn!("Table {} is empty, skipping SQL upload.", table.name);
        return Ok(0);
    }
    let written = store.replace_table(table)?;
    tracing::info!("Loaded {} rows into '{}'", written, table.name);
    Ok(written)
}

/// Append a typed table's rows, creating the table on first use
pub fn append(store: &dyn TableStore, table: &TypedTable) -> StoreResult<usize> {
    if table.is_empty() {
        tracing::warn!("Table {} is empty, nothing to append.", table.name);
        return Ok(0);
    }
    let written = store.append_table(table)?;
    tracing::info!("Appended {} rows to '{}'", written, table.name);
    Ok(written)
}

/// Run a SQL script file against the store
pub fn run_script(store: &dyn TableStore, path: &Path) -> StoreResult<()> {
    if !path.exists() {
        return Err(StoreError::ScriptNotFound(path.to_path_buf()));
    }
    tracing::info!("Executing SQL script {}", path.display());
    let sql = std::fs::read_to_string(path)
        .map_err(|e| StoreError::IoError(format!("{}: {}", path.display(), e)))?;
    store.execute_batch(&sql)
}

/// How the `query` command prints a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Aligned columns with a row count
    #[default]
    Table,
    /// Pretty-printed array of row objects
    Json,
    /// Header line plus quoted values
    Csv,
}

impl OutputFormat {
    const ALL: [OutputFormat; 3] = [OutputFormat::Table, OutputFormat::Json, OutputFormat::Csv];

    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|f| f.name()).collect();
                format!("Unknown output format: {} (use {})", s, names.join(", "))
            })
    }
}

impl QueryResult {
    /// Render the result set for the terminal
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => format!("{:#}", serde_json::Value::Array(self.rows.clone())),
            OutputFormat::Csv => self.render_csv(),
            OutputFormat::Table => self.render_table(),
        }
    }

    /// Row values as display strings, in column order
    fn cells(&self, null: &str) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|col| match row.get(col) {
                        Some(serde_json::Value::String(s)) => s.clone(),
                        None | Some(serde_json::Value::Null) => null.to_string(),
                        Some(other) => other.to_string(),
                    })
                    .collect()
            })
            .collect()
    }

    fn render_csv(&self) -> String {
        let quote = |value: &String| {
            if value.contains([',', '"', '\n']) {
                format!("\"{}\"", value.replace('"', "\"\""))
            } else {
                value.clone()
            }
        };

        let mut lines = vec![self.columns.join(",")];
        lines.extend(
            self.cells("")
                .iter()
                .map(|row| row.iter().map(quote).collect::<Vec<_>>().join(",")),
        );
        lines.join("\n") + "\n"
    }

    fn render_table(&self) -> String {
        if self.is_empty() {
            return "(0 rows)".to_string();
        }

        let cells = self.cells("null");
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                cells
                    .iter()
                    .map(|row| row[i].len())
                    .fold(col.len(), usize::max)
            })
            .collect();
        let line = |values: &[String]| {
            values
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:w$}", v, w = *w))
                .collect::<Vec<_>>()
                .join(" | ")
        };

        let mut lines = vec![line(&self.columns)];
        lines.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        lines.extend(cells.iter().map(|row| line(row)));
        lines.push(format!("({} rows)", self.row_count()));
        lines.join("\n")
    }
}
