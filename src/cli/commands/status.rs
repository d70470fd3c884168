//! Status command: what the pipeline would see on its next run

use std::path::PathBuf;

use chrono::Local;

use super::load_config;
use crate::cli::error::CliError;
use crate::extract::{ChangeDetector, locate};
use crate::store::{DuckDbStore, TableStore};

/// Status command arguments
#[derive(Debug, Clone)]
pub struct StatusArgs {
    pub config: PathBuf,
}

/// Print backup, marker and database state
pub fn handle_status(args: &StatusArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;
    let today = Local::now().date_naive();

    let pickup = config.pickup_dir();
    println!("Pickup directory: {}", pickup.display());
    if pickup.is_dir() {
        match locate(&pickup, &config.backup.extension, today)? {
            Some(artifact) => println!("  latest backup:  {}", artifact.file_name()),
            None => println!("  latest backup:  (none)"),
        }
    } else {
        println!("  (directory does not exist)");
    }

    let marker = ChangeDetector::new(config.marker_path()).current()?;
    println!(
        "Last processed:   {}",
        marker.as_deref().unwrap_or("(never)")
    );

    let canonical = config.canonical_json_path();
    println!(
        "Extracted data:   {}{}",
        canonical.display(),
        if canonical.exists() { "" } else { " (missing)" }
    );

    let db_path = config.db_path();
    println!("Database:         {}", db_path.display());
    if !db_path.exists() {
        println!("  (not created yet)");
        return Ok(());
    }

    let store = DuckDbStore::new(&db_path)?;
    let tables = store.execute_query(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = 'main' AND table_type = 'BASE TABLE' ORDER BY table_name",
    )?;
    for row in &tables.rows {
        if let Some(name) = row.get("table_name").and_then(|v| v.as_str()) {
            println!("  {:<24} {:>8} rows", name, store.row_count(name)?);
        }
    }
    Ok(())
}
