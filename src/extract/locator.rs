//! Backup discovery in the pickup directory

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{EtlError, EtlResult};

/// One dated backup container found in the pickup directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub created: SystemTime,
}

impl BackupArtifact {
    /// Identifier recorded by the change detector
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Filename of the backup the app would write on `date`
pub fn backup_file_name(date: NaiveDate, extension: &str) -> String {
    format!("{}.{}", date.format("backup_%Y_%m_%d"), extension)
}

fn backup_pattern(extension: &str) -> EtlResult<Regex> {
    Regex::new(&format!(
        r"^backup_\d{{4}}_\d{{2}}_\d{{2}}\.{}$",
        regex::escape(extension)
    ))
    .map_err(|e| EtlError::Config(format!("Invalid backup extension '{}': {}", extension, e)))
}

/// Creation time, falling back to modification time where the filesystem
/// does not record births
fn created_at(path: &Path) -> EtlResult<SystemTime> {
    let metadata = std::fs::metadata(path).map_err(|e| EtlError::io(path, e))?;
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .map_err(|e| EtlError::io(path, e))
}

/// All files in `pickup_dir` matching `backup_YYYY_MM_DD.<extension>`
pub fn discover_backups(pickup_dir: &Path, extension: &str) -> EtlResult<Vec<BackupArtifact>> {
    if !pickup_dir.is_dir() {
        tracing::error!("Pickup directory {} does not exist", pickup_dir.display());
        return Err(EtlError::DirectoryNotFound(pickup_dir.to_path_buf()));
    }

    let pattern = backup_pattern(extension)?;
    let glob_pattern = Path::new(&glob::Pattern::escape(&pickup_dir.to_string_lossy()))
        .join(format!("backup_*.{}", glob::Pattern::escape(extension)));
    let entries = glob::glob(&glob_pattern.to_string_lossy())
        .map_err(|e| EtlError::Config(format!("Invalid pickup pattern: {}", e)))?;

    let mut backups = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => {
                let matches = path
                    .file_name()
                    .map(|n| pattern.is_match(&n.to_string_lossy()))
                    .unwrap_or(false);
                if matches && path.is_file() {
                    let created = created_at(&path)?;
                    backups.push(BackupArtifact { path, created });
                }
            }
            Err(e) => {
                tracing::warn!("Error accessing path: {}", e);
            }
        }
    }

    backups.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(backups)
}

/// Find the backup to process
///
/// Today's backup wins when present; otherwise the most recently created
/// matching file. Returns `Ok(None)` when the directory holds no backups.
pub fn locate(
    pickup_dir: &Path,
    extension: &str,
    today: NaiveDate,
) -> EtlResult<Option<BackupArtifact>> {
    if !pickup_dir.is_dir() {
        tracing::error!("Pickup directory {} does not exist", pickup_dir.display());
        return Err(EtlError::DirectoryNotFound(pickup_dir.to_path_buf()));
    }

    let todays_path = pickup_dir.join(backup_file_name(today, extension));
    tracing::info!(
        "Searching for todays backup file: {}",
        backup_file_name(today, extension)
    );
    if todays_path.is_file() {
        let created = created_at(&todays_path)?;
        return Ok(Some(BackupArtifact {
            path: todays_path,
            created,
        }));
    }

    tracing::info!("Todays backup not found, finding latest backup...");
    let latest = discover_backups(pickup_dir, extension)?
        .into_iter()
        .max_by(|a, b| a.created.cmp(&b.created).then_with(|| a.path.cmp(&b.path)));

    match &latest {
        Some(artifact) => tracing::info!("Latest backup is {}", artifact.file_name()),
        None => tracing::warn!("No backup files found in {}", pickup_dir.display()),
    }

    Ok(latest)
}
