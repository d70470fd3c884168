//! Pipeline configuration file support
//!
//! Handles parsing of `mood-dash.toml` configuration files and environment
//! variable overrides. The resulting [`EtlConfig`] is built once at process
//! start and passed to every component; nothing reads paths or environment
//! variables behind the caller's back.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EtlError, EtlResult};
use crate::models::TableRole;

/// Default configuration filename
pub const CONFIG_FILENAME: &str = "mood-dash.toml";

/// Environment variable for the backup pickup directory
pub const ENV_PICKUP_DIR: &str = "DAYLIO_PICKUP_DIR";

/// Environment variable for the working data directory
pub const ENV_DATA_DIR: &str = "MOOD_DASH_DATA_DIR";

/// Environment variable for the DuckDB database path
pub const ENV_DB_PATH: &str = "MOOD_DASH_DB_PATH";

/// Schema catalog filename inside the static directory
pub const TABLE_INFO_FILENAME: &str = "table_info.json";

/// Allow-list filename inside the static directory
pub const ALLOW_LIST_FILENAME: &str = "tables_needed.txt";

/// Change marker filename inside the static directory
pub const MARKER_FILENAME: &str = "last_updated.txt";

/// Static mood group reference filename inside the static directory
pub const MOOD_GROUPS_FILENAME: &str = "mood_groups.json";

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    /// Directory scanned for `backup_YYYY_MM_DD.<ext>` files
    pub pickup_dir: String,
    /// Working directory for extraction and the canonical JSON document
    pub data_dir: String,
    /// Directory holding the schema catalog, allow-list, marker and reference data
    pub static_dir: String,
}

fn default_pickup_dir() -> String {
    match std::env::var("HOME") {
        Ok(home) => Path::new(&home).join("Downloads").display().to_string(),
        Err(_) => "Downloads".to_string(),
    }
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            pickup_dir: default_pickup_dir(),
            data_dir: "data".to_string(),
            static_dir: "data/static".to_string(),
        }
    }
}

/// Backup container layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSection {
    /// Extension of backup files in the pickup directory
    pub extension: String,
    /// Name of the base64 payload inside the archive
    pub payload_name: String,
    /// Archive subtree that is deleted after unpacking
    pub assets_dir: String,
    /// Prefix of the canonical document and its dated archive copies
    pub archive_prefix: String,
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            extension: "daylio".to_string(),
            payload_name: "backup.daylio".to_string(),
            assets_dir: "assets".to_string(),
            archive_prefix: "daylio".to_string(),
        }
    }
}

/// Relational store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Path to the DuckDB database file
    pub path: String,
    /// SQL script run once when the database is first created
    pub create_tables_sql: Option<String>,
    /// SQL script creating reporting views, run after `create_tables_sql`
    pub create_views_sql: Option<String>,
    /// First day of the rolling calendar table
    pub calendar_start: NaiveDate,
}

fn default_calendar_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default()
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: "data/daylio.duckdb".to_string(),
            create_tables_sql: None,
            create_views_sql: None,
            calendar_start: default_calendar_start(),
        }
    }
}

/// Names of the tables that get special treatment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesSection {
    pub entries: String,
    pub goals: String,
    pub custom_moods: String,
    pub prefs: String,
    pub entry_tags: String,
    pub mood_groups: String,
}

impl Default for TablesSection {
    fn default() -> Self {
        Self {
            entries: "dayEntries".to_string(),
            goals: "goals".to_string(),
            custom_moods: "customMoods".to_string(),
            prefs: "prefs".to_string(),
            entry_tags: "entry_tags".to_string(),
            mood_groups: "mood_groups".to_string(),
        }
    }
}

impl TablesSection {
    /// Resolve the role a backup table plays
    pub fn role_of(&self, table_name: &str) -> TableRole {
        if table_name == self.entries {
            TableRole::Entries
        } else if table_name == self.goals {
            TableRole::Goals
        } else if table_name == self.custom_moods {
            TableRole::CustomMoods
        } else if table_name == self.prefs {
            TableRole::Prefs
        } else {
            TableRole::Standard
        }
    }
}

/// Where sleep logs come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SleepSourceKind {
    /// A saved API response on disk
    #[default]
    File,
    /// The Fitbit Web API (requires the `fitbit-api` feature)
    FitbitApi,
}

impl std::str::FromStr for SleepSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(SleepSourceKind::File),
            "fitbit-api" | "fitbit" => Ok(SleepSourceKind::FitbitApi),
            _ => Err(format!(
                "Unknown sleep source: {}. Use 'file' or 'fitbit-api'.",
                s
            )),
        }
    }
}

/// Secondary sleep data source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepSection {
    pub enabled: bool,
    pub source: SleepSourceKind,
    /// Saved sleep response, for the `file` source
    pub file: String,
    /// Token file holding `access_token`, for the `fitbit-api` source
    pub tokens: String,
    /// Number of days to fetch, ending today
    pub days: u32,
    /// Store table the sleep logs are loaded into
    pub table: String,
}

impl Default for SleepSection {
    fn default() -> Self {
        Self {
            enabled: false,
            source: SleepSourceKind::default(),
            file: "data/fitbit_sleep.json".to_string(),
            tokens: "data/fitbit_tokens.json".to_string(),
            days: 90,
            table: "fitbit_sleep".to_string(),
        }
    }
}

/// Main configuration structure
///
/// Represents the `mood-dash.toml` configuration file format. Relative paths
/// are resolved against the directory the configuration was loaded from.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EtlConfig {
    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub backup: BackupSection,

    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub tables: TablesSection,

    #[serde(default)]
    pub sleep: SleepSection,

    /// Base directory for relative paths
    #[serde(skip)]
    pub root: PathBuf,
}

impl EtlConfig {
    /// Create a new default configuration rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a file
    ///
    /// Falls back to defaults if the file does not exist. Environment
    /// overrides are applied in both cases.
    pub fn load(config_path: &Path) -> EtlResult<Self> {
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| EtlError::io(config_path, e))?;
            Self::parse(&content)?
        } else {
            tracing::debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };
        config.root = root;

        config.apply_env_overrides();

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> EtlResult<Self> {
        toml::from_str(content)
            .map_err(|e| EtlError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a file
    pub fn save(&self, config_path: &Path) -> EtlResult<()> {
        let content = self.to_toml()?;
        std::fs::write(config_path, content).map_err(|e| EtlError::io(config_path, e))
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> EtlResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| EtlError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(ENV_PICKUP_DIR) {
            self.paths.pickup_dir = dir;
        }

        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            self.paths.data_dir = dir;
        }

        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            self.database.path = path;
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.root.join(path)
        }
    }

    pub fn pickup_dir(&self) -> PathBuf {
        self.resolve(&self.paths.pickup_dir)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.resolve(&self.paths.data_dir)
    }

    pub fn static_dir(&self) -> PathBuf {
        self.resolve(&self.paths.static_dir)
    }

    pub fn table_info_path(&self) -> PathBuf {
        self.static_dir().join(TABLE_INFO_FILENAME)
    }

    pub fn allow_list_path(&self) -> PathBuf {
        self.static_dir().join(ALLOW_LIST_FILENAME)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.static_dir().join(MARKER_FILENAME)
    }

    pub fn mood_groups_path(&self) -> PathBuf {
        self.static_dir().join(MOOD_GROUPS_FILENAME)
    }

    /// Canonical location of the filtered backup document
    pub fn canonical_json_path(&self) -> PathBuf {
        self.data_dir()
            .join(format!("{}.json", self.backup.archive_prefix))
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.data_dir().join("archive")
    }

    pub fn db_path(&self) -> PathBuf {
        self.resolve(&self.database.path)
    }

    pub fn create_tables_sql_path(&self) -> Option<PathBuf> {
        self.database
            .create_tables_sql
            .as_deref()
            .map(|p| self.resolve(p))
    }

    pub fn create_views_sql_path(&self) -> Option<PathBuf> {
        self.database
            .create_views_sql
            .as_deref()
            .map(|p| self.resolve(p))
    }

    pub fn sleep_file_path(&self) -> PathBuf {
        self.resolve(&self.sleep.file)
    }

    pub fn sleep_tokens_path(&self) -> PathBuf {
        self.resolve(&self.sleep.tokens)
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Mood Dash ETL configuration

[paths]
# Where the Daylio app drops backup_YYYY_MM_DD.daylio files
pickup_dir = "/home/me/Downloads"
data_dir = "data"
static_dir = "data/static"

[backup]
extension = "daylio"
payload_name = "backup.daylio"
assets_dir = "assets"
archive_prefix = "daylio"

[database]
path = "data/daylio.duckdb"
# create_tables_sql = "sql/create_tables.sql"
# create_views_sql = "sql/create_views.sql"
calendar_start = "2018-01-01"

[tables]
entries = "dayEntries"
goals = "goals"
custom_moods = "customMoods"
prefs = "prefs"

[sleep]
enabled = false
# "file" or "fitbit-api"
source = "file"
file = "data/fitbit_sleep.json"
tokens = "data/fitbit_tokens.json"
days = 90
table = "fitbit_sleep"
"#
}
