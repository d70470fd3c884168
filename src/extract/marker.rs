//! Change detection against the last processed backup

use std::path::{Path, PathBuf};

use crate::error::{EtlError, EtlResult};

/// Persists the identifier of the last processed backup
///
/// The marker is a single text line. [`ChangeDetector::has_processed`] only
/// reads it and [`ChangeDetector::record`] commits a new identifier, so a
/// caller can defer the write until the backup has been extracted.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    marker_path: PathBuf,
}

impl ChangeDetector {
    pub fn new(marker_path: impl Into<PathBuf>) -> Self {
        Self {
            marker_path: marker_path.into(),
        }
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Read the stored identifier without changing it
    pub fn current(&self) -> EtlResult<Option<String>> {
        if !self.marker_path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.marker_path)
            .map_err(|e| EtlError::io(&self.marker_path, e))?;
        let trimmed = content.trim();
        Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }

    /// True when `identifier` is the stored marker; never writes
    pub fn has_processed(&self, identifier: &str) -> EtlResult<bool> {
        Ok(self.current()?.as_deref() == Some(identifier))
    }

    /// Store `identifier` as the last processed backup
    ///
    /// Call only once the backup's data is safely extracted.
    pub fn record(&self, identifier: &str) -> EtlResult<()> {
        if let Some(parent) = self.marker_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EtlError::io(parent, e))?;
        }
        std::fs::write(&self.marker_path, identifier)
            .map_err(|e| EtlError::io(&self.marker_path, e))?;
        tracing::debug!("Recorded {} as last processed backup", identifier);
        Ok(())
    }

    /// Return true and record `identifier` when it differs from the stored marker
    pub fn is_new(&self, identifier: &str) -> EtlResult<bool> {
        if self.has_processed(identifier)? {
            tracing::info!("Data has already been processed: {}", identifier);
            return Ok(false);
        }
        self.record(identifier)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_call_is_new() {
        let dir = TempDir::new().unwrap();
        let detector = ChangeDetector::new(dir.path().join("static/last_updated.txt"));

        assert_eq!(detector.current().unwrap(), None);
        assert!(detector.is_new("backup_2024_01_05.daylio").unwrap());
        assert_eq!(
            detector.current().unwrap().as_deref(),
            Some("backup_2024_01_05.daylio")
        );
    }

    #[test]
    fn test_same_identifier_is_not_new() {
        let dir = TempDir::new().unwrap();
        let detector = ChangeDetector::new(dir.path().join("last_updated.txt"));

        assert!(detector.is_new("backup_2024_01_05.daylio").unwrap());
        assert!(!detector.is_new("backup_2024_01_05.daylio").unwrap());
        assert!(!detector.is_new("backup_2024_01_05.daylio").unwrap());
    }

    #[test]
    fn test_different_identifier_overwrites() {
        let dir = TempDir::new().unwrap();
        let detector = ChangeDetector::new(dir.path().join("last_updated.txt"));

        assert!(detector.is_new("backup_2024_01_05.daylio").unwrap());
        assert!(detector.is_new("backup_2024_01_06.daylio").unwrap());
        assert_eq!(
            detector.current().unwrap().as_deref(),
            Some("backup_2024_01_06.daylio")
        );
    }

    #[test]
    fn test_marker_whitespace_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_updated.txt");
        std::fs::write(&path, "backup_2024_01_05.daylio\n").unwrap();

        let detector = ChangeDetector::new(&path);
        assert!(!detector.is_new("backup_2024_01_05.daylio").unwrap());
    }

    #[test]
    fn test_has_processed_does_not_write() {
        let dir = TempDir::new().unwrap();
        let detector = ChangeDetector::new(dir.path().join("last_updated.txt"));

        assert!(!detector.has_processed("backup_2024_01_05.daylio").unwrap());
        assert_eq!(detector.current().unwrap(), None);

        detector.record("backup_2024_01_05.daylio").unwrap();
        assert!(detector.has_processed("backup_2024_01_05.daylio").unwrap());
        assert!(!detector.has_processed("backup_2024_01_06.daylio").unwrap());
        assert_eq!(
            detector.current().unwrap().as_deref(),
            Some("backup_2024_01_05.daylio")
        );
    }
}
