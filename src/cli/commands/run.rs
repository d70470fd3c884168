//! Full pipeline run command

use std::path::PathBuf;

use chrono::Local;

use super::load_config;
use crate::cli::error::CliError;
use crate::pipeline::{RunOptions, RunStats, run};
use crate::store::DuckDbStore;

/// Run command arguments
#[derive(Debug, Clone)]
pub struct RunArgs {
    /// Path to the configuration file
    pub config: PathBuf,
    /// Extract the latest backup even if it was already processed
    pub force: bool,
}

/// Extract, clean and load everything into the configured database
pub fn handle_run(args: &RunArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;

    let db_path = config.db_path();
    let initialize_store = !db_path.exists();
    if initialize_store {
        tracing::info!(
            "Database not found at {}, creating new database",
            db_path.display()
        );
    }
    let store = DuckDbStore::new(&db_path)?;

    let mut options = RunOptions::new(Local::now().naive_local());
    options.force = args.force;
    options.initialize_store = initialize_store;

    let stats = run(&config, &store, options)?;
    print_summary(&stats);
    Ok(())
}

fn print_summary(stats: &RunStats) {
    match &stats.backup {
        Some(name) if stats.extracted => println!("Extracted backup {}", name),
        Some(name) => println!("Backup {} already processed", name),
        None => println!("No backup found"),
    }
    for table in &stats.tables_loaded {
        println!("  {:<24} {:>8} rows", table.name, table.rows);
    }
    if !stats.tables_skipped.is_empty() {
        println!("  skipped (empty): {}", stats.tables_skipped.join(", "));
    }
    println!(
        "Loaded {} rows into {} tables in {}",
        stats.rows_loaded(),
        stats.tables_loaded.len(),
        stats.duration_string()
    );
}
