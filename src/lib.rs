//! Mood Dash ETL - loads Daylio mood backups and Fitbit sleep logs into DuckDB
//!
//! Provides:
//! - Backup discovery, change detection and extraction (`extract`)
//! - A schema catalog and a schema-driven table cleaner (`catalog`, `clean`)
//! - Derived tables: entry tags, mood groups, prefs snapshot, calendar
//! - A relational store abstraction with a DuckDB implementation (`store`)
//! - Sleep log cleaning for the secondary data source (`sleep`)
//! - Run orchestration (`pipeline`)

pub mod catalog;
pub mod clean;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod sleep;
pub mod store;

#[cfg(feature = "cli")]
pub mod cli;

pub use catalog::SchemaCatalog;
pub use clean::{CleanedTable, TableCleaner};
pub use config::EtlConfig;
pub use error::{EtlError, EtlResult};
pub use extract::{BackupArtifact, ChangeDetector, ExtractionPipeline};
pub use models::{CellValue, ColumnSpec, ColumnType, RawTable, TableRole, TableSchema, TypedTable};
pub use pipeline::{RunOptions, RunStats, run};
#[cfg(feature = "duckdb-backend")]
pub use store::DuckDbStore;
pub use store::{StoreError, TableStore};
