//! Error types for the ETL core

use std::path::PathBuf;

use crate::store::StoreError;

/// Fatal conditions that abort a pipeline run
///
/// There is no local recovery anywhere in the core: every variant is
/// surfaced to the caller, which reports it and stops.
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    /// Pickup or schema location does not exist
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// Corrupt archive, missing payload or undecodable JSON
    #[error("Failed to decode backup: {0}")]
    DecodeError(String),

    /// Schema catalog file is missing
    #[error("Schema catalog not found: {0}")]
    SchemaNotFound(PathBuf),

    /// Table has no entry in the schema catalog
    #[error("No column information found for table '{0}'")]
    UnknownTable(String),

    /// Schema catalog entry is malformed
    #[error("Invalid schema catalog: {0}")]
    InvalidSchema(String),

    /// Derived table builder was handed the wrong source table
    #[error("Cannot build '{target}' from table '{found}', expected '{expected}'")]
    WrongSourceTable {
        target: String,
        expected: String,
        found: String,
    },

    /// Cleaned records lack a declared column
    #[error("Table '{table}' is missing declared column '{column}'")]
    SchemaMismatch { table: String, column: String },

    /// A required static input file does not exist
    #[error("Required file not found: {0}")]
    MissingFile(PathBuf),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sleep data could not be fetched
    #[error("Sleep source error: {0}")]
    SleepSource(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EtlError {
    /// Wrap an IO error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EtlError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a JSON error with the file it happened in
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        EtlError::Json {
            path: path.into(),
            source,
        }
    }
}

/// Result type for ETL operations
pub type EtlResult<T> = Result<T, EtlError>;
