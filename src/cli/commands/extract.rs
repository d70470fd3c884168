//! Extraction-only command

use std::path::PathBuf;

use chrono::Local;

use super::load_config;
use crate::cli::error::CliError;
use crate::pipeline::extract_if_new;

/// Extract command arguments
#[derive(Debug, Clone)]
pub struct ExtractArgs {
    pub config: PathBuf,
    pub force: bool,
}

/// Locate, gate and extract the newest backup without loading it
pub fn handle_extract(args: &ExtractArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;
    let outcome = extract_if_new(&config, Local::now().naive_local(), args.force)?;

    match (outcome.backup, outcome.extracted) {
        (Some(name), true) => println!(
            "Extracted {} to {}",
            name,
            config.canonical_json_path().display()
        ),
        (Some(name), false) => println!("{} was already processed, nothing to do", name),
        (None, _) => println!("No backup found in {}", config.pickup_dir().display()),
    }
    Ok(())
}
