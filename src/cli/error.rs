//! CLI-specific error types

use thiserror::Error;

use crate::error::EtlError;
use crate::store::StoreError;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to load config: {0}")]
    ConfigError(String),

    #[error("Database not found at {0}. Run 'mood-dash-etl run' first.")]
    DatabaseMissing(String),

    #[error(transparent)]
    Etl(#[from] EtlError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] StoreError),
}
