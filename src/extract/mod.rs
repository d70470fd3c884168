//! Backup location, change detection and extraction

mod archive;
mod locator;
mod marker;

pub use archive::{
    BackupDocument, ExtractionPipeline, RawTables, decode_payload, filter_tables,
    load_allow_list, parse_allow_list, raw_tables, read_canonical,
};
pub use locator::{BackupArtifact, backup_file_name, discover_backups, locate};
pub use marker::ChangeDetector;
