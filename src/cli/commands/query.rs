//! SQL query CLI command
//!
//! Provides a command to execute SQL queries against the mood database.

use std::path::PathBuf;

use super::load_config;
use crate::cli::error::CliError;
use crate::store::{DuckDbStore, OutputFormat, TableStore};

/// Query command arguments
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// SQL query to execute
    pub sql: String,
    /// Path to the configuration file
    pub config: PathBuf,
    /// Output format
    pub format: String,
}

/// Execute a SQL query against the configured database
pub fn handle_query(args: &QueryArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;

    let db_path = config.db_path();
    if !db_path.exists() {
        return Err(CliError::DatabaseMissing(db_path.display().to_string()));
    }

    let output_format: OutputFormat = args
        .format
        .parse()
        .map_err(|e: String| CliError::InvalidArgument(e))?;

    let store = DuckDbStore::new(&db_path)?;
    let result = store.execute_query(&args.sql)?;

    println!("{}", result.render(output_format));

    // Print execution time for non-JSON formats
    if output_format != OutputFormat::Json {
        eprintln!("\nExecution time: {}ms", result.execution_time_ms);
    }

    Ok(())
}
