//! Backup unpacking, decoding, filtering and archival
//!
//! A backup is a zip container holding a base64-encoded JSON payload (one key
//! per table) next to an `assets` subtree of media files. Extraction unpacks
//! the container into the working directory, drops the assets, decodes the
//! payload, keeps the allow-listed tables, and writes the result to the
//! canonical document plus a dated archive copy.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use super::locator::BackupArtifact;
use crate::config::EtlConfig;
use crate::error::{EtlError, EtlResult};
use crate::models::RawTable;

/// Decoded backup document: table name to raw JSON value
pub type BackupDocument = Map<String, Value>;

/// Raw tables keyed by table name
pub type RawTables = BTreeMap<String, RawTable>;

/// Read the newline-delimited table allow-list
pub fn load_allow_list(path: &Path) -> EtlResult<Vec<String>> {
    if !path.exists() {
        tracing::error!("Selected tables file {} does not exist", path.display());
        return Err(EtlError::MissingFile(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| EtlError::io(path, e))?;
    Ok(parse_allow_list(&content))
}

/// Parse allow-list text, ignoring blank lines
pub fn parse_allow_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Decode a base64 payload into the backup JSON document
pub fn decode_payload(encoded: &[u8]) -> EtlResult<BackupDocument> {
    let compact: Vec<u8> = encoded
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&compact)
        .map_err(|e| EtlError::DecodeError(format!("payload is not valid base64: {}", e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| EtlError::DecodeError(format!("payload is not valid UTF-8: {}", e)))?;

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(other) => Err(EtlError::DecodeError(format!(
            "payload is not a JSON object but {}",
            json_kind(&other)
        ))),
        Err(e) => Err(EtlError::DecodeError(format!(
            "payload is not valid JSON: {}",
            e
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Keep only allow-listed tables; listed tables absent from the document are skipped
pub fn filter_tables(document: &BackupDocument, allowed: &[String]) -> BackupDocument {
    let mut filtered = Map::new();
    for name in allowed {
        match document.get(name) {
            Some(value) => {
                filtered.insert(name.clone(), value.clone());
            }
            None => tracing::debug!("Allow-listed table '{}' not in backup, skipping", name),
        }
    }
    filtered
}

/// Convert a document into raw tables
pub fn raw_tables(document: BackupDocument) -> EtlResult<RawTables> {
    let mut tables = BTreeMap::new();
    for (name, value) in document {
        let table = RawTable::from_value(name.clone(), value).map_err(EtlError::DecodeError)?;
        tables.insert(name, table);
    }
    Ok(tables)
}

/// Read the canonical document written by a previous extraction
///
/// Returns `Ok(None)` when no extraction has happened yet.
pub fn read_canonical(path: &Path) -> EtlResult<Option<RawTables>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| EtlError::io(path, e))?;
    let document: BackupDocument =
        serde_json::from_str(&content).map_err(|e| EtlError::json(path, e))?;
    raw_tables(document).map(Some)
}

/// Unpacks, decodes, filters and persists a backup
#[derive(Debug, Clone)]
pub struct ExtractionPipeline {
    /// Directory the archive is unpacked into
    pub work_dir: PathBuf,
    /// Name of the payload file inside the archive
    pub payload_name: String,
    /// Subtree removed after unpacking
    pub assets_dir: String,
    /// Where the filtered document is written
    pub canonical_path: PathBuf,
    /// Where dated copies of the document are kept
    pub archive_dir: PathBuf,
    /// Prefix of archive copy filenames
    pub archive_prefix: String,
}

impl ExtractionPipeline {
    pub fn from_config(config: &EtlConfig) -> Self {
        Self {
            work_dir: config.data_dir(),
            payload_name: config.backup.payload_name.clone(),
            assets_dir: config.backup.assets_dir.clone(),
            canonical_path: config.canonical_json_path(),
            archive_dir: config.archive_dir(),
            archive_prefix: config.backup.archive_prefix.clone(),
        }
    }

    /// Run every extraction step for one backup
    ///
    /// `now` stamps the archive copy.
    pub fn extract(
        &self,
        artifact: &BackupArtifact,
        allowed_tables: &[String],
        now: NaiveDateTime,
    ) -> EtlResult<RawTables> {
        tracing::info!("Extracting {}", artifact.file_name());

        self.unpack(&artifact.path)?;
        let document = self.decode()?;
        let filtered = filter_tables(&document, allowed_tables);
        self.save_canonical(&filtered)?;
        self.archive(now)?;

        raw_tables(filtered)
    }

    /// Unzip the container into the working directory and drop the assets subtree
    pub fn unpack(&self, archive_path: &Path) -> EtlResult<()> {
        tracing::info!("Extracting zipped data from backup file into data directory");

        let file = File::open(archive_path).map_err(|e| EtlError::io(archive_path, e))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| {
            EtlError::DecodeError(format!(
                "{} is not a valid archive: {}",
                archive_path.display(),
                e
            ))
        })?;

        std::fs::create_dir_all(&self.work_dir).map_err(|e| EtlError::io(&self.work_dir, e))?;
        archive.extract(&self.work_dir).map_err(|e| {
            EtlError::DecodeError(format!(
                "failed to unpack {}: {}",
                archive_path.display(),
                e
            ))
        })?;

        let assets = self.work_dir.join(&self.assets_dir);
        if assets.exists() {
            std::fs::remove_dir_all(&assets).map_err(|e| EtlError::io(&assets, e))?;
        }
        Ok(())
    }

    /// Read and decode the unpacked payload
    pub fn decode(&self) -> EtlResult<BackupDocument> {
        let payload = self.work_dir.join(&self.payload_name);
        tracing::info!("Decoding backup from base64 to utf-8");

        let encoded = std::fs::read(&payload).map_err(|e| {
            EtlError::DecodeError(format!("cannot read payload {}: {}", payload.display(), e))
        })?;
        decode_payload(&encoded)
    }

    /// Write the filtered document to the canonical location, replacing it
    pub fn save_canonical(&self, document: &BackupDocument) -> EtlResult<()> {
        if let Some(parent) = self.canonical_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EtlError::io(parent, e))?;
        }
        tracing::info!(
            "Saving decoded data as json: {}",
            self.canonical_path.display()
        );

        let json = serde_json::to_string_pretty(document)
            .map_err(|e| EtlError::json(&self.canonical_path, e))?;
        std::fs::write(&self.canonical_path, json)
            .map_err(|e| EtlError::io(&self.canonical_path, e))
    }

    /// Path of the archive copy for a given timestamp
    pub fn archive_path(&self, now: NaiveDateTime) -> PathBuf {
        self.archive_dir.join(format!(
            "{}_{}.json",
            self.archive_prefix,
            now.format("%Y%m%d_%H%M")
        ))
    }

    /// Copy the canonical document to its dated archive location
    pub fn archive(&self, now: NaiveDateTime) -> EtlResult<PathBuf> {
        let archive_path = self.archive_path(now);
        tracing::info!(
            "Creating archive copy of todays json file: {}",
            archive_path.display()
        );

        std::fs::create_dir_all(&self.archive_dir)
            .map_err(|e| EtlError::io(&self.archive_dir, e))?;
        std::fs::copy(&self.canonical_path, &archive_path)
            .map_err(|e| EtlError::io(&archive_path, e))?;
        Ok(archive_path)
    }
}
