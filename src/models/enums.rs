//! Enums for table classification

use serde::{Deserialize, Serialize};

/// The part a backup table plays in cleaning and loading
///
/// Resolved from the configured table names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableRole {
    /// Primary day entries; source of the `entry_tags` table
    Entries,
    /// Goals; `-1` is an additional "no timestamp" sentinel
    Goals,
    /// Custom mood definitions; receives `mood_value` and default names
    CustomMoods,
    /// Key/value preferences, loaded as a one-row snapshot
    Prefs,
    /// Any other allow-listed table
    Standard,
}

impl std::fmt::Display for TableRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableRole::Entries => write!(f, "entries"),
            TableRole::Goals => write!(f, "goals"),
            TableRole::CustomMoods => write!(f, "custom_moods"),
            TableRole::Prefs => write!(f, "prefs"),
            TableRole::Standard => write!(f, "standard"),
        }
    }
}
