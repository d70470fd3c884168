//! CLI command implementations

pub mod extract;
pub mod query;
pub mod run;
pub mod status;

use std::path::Path;

use crate::cli::error::CliError;
use crate::config::EtlConfig;

/// Load the configuration file, falling back to defaults when it is absent
pub fn load_config(path: &Path) -> Result<EtlConfig, CliError> {
    EtlConfig::load(path).map_err(|e| CliError::ConfigError(e.to_string()))
}
