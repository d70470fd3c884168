//! End-to-end run orchestration
//!
//! A run locates the newest backup, extracts it when the change marker says it
//! has not been seen, cleans every table of the canonical document, derives
//! the auxiliary tables, and finally loads everything into the store. All
//! cleaning finishes before the first table is written.

use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::catalog::SchemaCatalog;
use crate::clean::{
    TableCleaner, build_calendar, build_entry_tags, load_mood_groups, prefs_snapshot,
};
use crate::config::EtlConfig;
use crate::error::EtlResult;
use crate::extract::{
    ChangeDetector, ExtractionPipeline, RawTables, load_allow_list, locate, read_canonical,
};
use crate::models::{TableRole, TypedTable};
use crate::sleep::{clean_sleep, sleep_window, source_from_config};
use crate::store::{self, TableStore};

/// Per-run switches
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Wall-clock time of the run; its date picks today's backup
    pub now: NaiveDateTime,
    /// Extract even when the backup was already processed
    pub force: bool,
    /// Run the initialization scripts and build the calendar first
    pub initialize_store: bool,
}

impl RunOptions {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now,
            force: false,
            initialize_store: false,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }
}

/// One table written during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedTable {
    pub name: String,
    pub rows: usize,
}

/// What a run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Backup file picked by the locator
    pub backup: Option<String>,
    /// Whether the backup was extracted in this run
    pub extracted: bool,
    /// Whether the store was initialized in this run
    pub store_initialized: bool,
    /// Tables replaced or appended, in load order
    pub tables_loaded: Vec<LoadedTable>,
    /// Tables skipped because they had no rows
    pub tables_skipped: Vec<String>,
    #[serde(skip)]
    pub duration: Duration,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows_loaded(&self) -> usize {
        self.tables_loaded.iter().map(|t| t.rows).sum()
    }

    /// Format duration as human-readable string
    pub fn duration_string(&self) -> String {
        let secs = self.duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}

/// Outcome of the locate/gate/extract stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOutcome {
    pub backup: Option<String>,
    pub extracted: bool,
}

/// Locate the newest backup and extract it if it has not been processed yet
pub fn extract_if_new(
    config: &EtlConfig,
    now: NaiveDateTime,
    force: bool,
) -> EtlResult<ExtractOutcome> {
    let Some(artifact) = locate(&config.pickup_dir(), &config.backup.extension, now.date())?
    else {
        tracing::info!("No backup available, nothing to extract");
        return Ok(ExtractOutcome {
            backup: None,
            extracted: false,
        });
    };

    let name = artifact.file_name();
    let detector = ChangeDetector::new(config.marker_path());
    if detector.has_processed(&name)? {
        if !force {
            tracing::info!("Data has already been processed: {}", name);
            return Ok(ExtractOutcome {
                backup: Some(name),
                extracted: false,
            });
        }
        tracing::info!("Forcing extraction of {}", name);
    }

    let allowed = load_allow_list(&config.allow_list_path())?;
    ExtractionPipeline::from_config(config).extract(&artifact, &allowed, now)?;
    // marker only moves once the canonical document holds this backup
    detector.record(&name)?;

    Ok(ExtractOutcome {
        backup: Some(name),
        extracted: true,
    })
}

/// Run the creation scripts and build the rolling calendar
pub fn initialize_store(
    config: &EtlConfig,
    store: &dyn TableStore,
    today: NaiveDate,
) -> EtlResult<usize> {
    if let Some(script) = config.create_tables_sql_path() {
        store::run_script(store, &script)?;
    }

    tracing::info!("Creating rolling calendar to-date and loading into sql db");
    let calendar = build_calendar(config.database.calendar_start, today)?;
    let rows = store::load(store, &calendar)?;

    if let Some(script) = config.create_views_sql_path() {
        store::run_script(store, &script)?;
    }
    Ok(rows)
}

/// Tables ready for the loader
#[derive(Debug, Default)]
struct PreparedTables {
    replace: Vec<TypedTable>,
    append: Vec<TypedTable>,
}

fn prepare_backup_tables(
    tables: &RawTables,
    cleaner: &TableCleaner<'_>,
    prepared: &mut PreparedTables,
) -> EtlResult<()> {
    for (name, raw) in tables {
        if cleaner.tables().role_of(name) == TableRole::Prefs {
            // small key/value table, kept as a one-row snapshot history
            prepared.append.push(prefs_snapshot(raw)?);
            continue;
        }

        tracing::info!("Cleaning data for table '{}'", name);
        let cleaned = cleaner.clean(raw)?;
        prepared.replace.push(cleaned.project()?);

        if cleaned.role == TableRole::Entries {
            tracing::info!("Creating entry_tags table from {}", name);
            prepared
                .replace
                .push(build_entry_tags(&cleaned, cleaner)?.project()?);
        }
    }
    Ok(())
}

fn prepare_sleep_table(config: &EtlConfig, today: NaiveDate) -> EtlResult<TypedTable> {
    let source = source_from_config(config)?;
    let (start, end) = sleep_window(today, config.sleep.days);
    tracing::info!(
        "Fetching sleep logs from {} for {} to {}",
        source.describe(),
        start,
        end
    );
    let logs = source.fetch(start, end)?;
    clean_sleep(&config.sleep.table, &logs)
}

/// Run the whole pipeline against `store`
pub fn run(config: &EtlConfig, store: &dyn TableStore, options: RunOptions) -> EtlResult<RunStats> {
    let start = Instant::now();
    let mut stats = RunStats::new();
    let today = options.today();

    tracing::info!("Mood Dash ETL beginning");

    if options.initialize_store {
        tracing::info!("Initializing new database");
        initialize_store(config, store, today)?;
        stats.store_initialized = true;
    }

    let catalog = SchemaCatalog::load(&config.table_info_path())?;
    let cleaner = TableCleaner::new(&catalog, &config.tables);

    let outcome = extract_if_new(config, options.now, options.force)?;
    stats.backup = outcome.backup;
    stats.extracted = outcome.extracted;

    let mut prepared = PreparedTables::default();
    let canonical = config.canonical_json_path();
    match read_canonical(&canonical)? {
        Some(tables) => {
            tracing::info!("Reading extracted data from {}", canonical.display());
            prepare_backup_tables(&tables, &cleaner, &mut prepared)?;
        }
        None => tracing::warn!(
            "No extracted data at {}, skipping backup tables",
            canonical.display()
        ),
    }

    tracing::info!("Creating mood_groups table");
    prepared
        .replace
        .push(load_mood_groups(&config.mood_groups_path(), &cleaner)?.project()?);

    if config.sleep.enabled {
        prepared.replace.push(prepare_sleep_table(config, today)?);
    }

    tracing::info!("Writing cleaned data to {} store", store.backend_type());
    for table in &prepared.replace {
        record_load(&mut stats, &table.name, store::load(store, table)?);
    }
    for table in &prepared.append {
        record_load(&mut stats, &table.name, store::append(store, table)?);
    }

    stats.duration = start.elapsed();
    tracing::info!(
        "Mood Dash ETL complete: {} tables, {} rows in {}",
        stats.tables_loaded.len(),
        stats.rows_loaded(),
        stats.duration_string()
    );
    Ok(stats)
}

fn record_load(stats: &mut RunStats, name: &str, rows: usize) {
    if rows == 0 {
        stats.tables_skipped.push(name.to_string());
    } else {
        stats.tables_loaded.push(LoadedTable {
            name: name.to_string(),
            rows,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_string() {
        let mut stats = RunStats::new();
        stats.duration = Duration::from_secs(42);
        assert_eq!(stats.duration_string(), "42s");
        stats.duration = Duration::from_secs(125);
        assert_eq!(stats.duration_string(), "2m 5s");
        stats.duration = Duration::from_secs(3725);
        assert_eq!(stats.duration_string(), "1h 2m 5s");
    }

    #[test]
    fn test_record_load_splits_skipped() {
        let mut stats = RunStats::new();
        record_load(&mut stats, "tags", 3);
        record_load(&mut stats, "goals", 0);
        assert_eq!(stats.rows_loaded(), 3);
        assert_eq!(stats.tables_skipped, vec!["goals"]);
    }
}
