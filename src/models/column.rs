//! Column declarations for catalog tables

use serde::{Deserialize, Serialize};

/// Storage type a column is coerced to before loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Timestamp,
    Integer,
    Text,
    Real,
    Boolean,
}

impl ColumnType {
    /// SQL type used when (re)creating a table in the store
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Integer => "BIGINT",
            ColumnType::Text => "VARCHAR",
            ColumnType::Real => "DOUBLE",
            ColumnType::Boolean => "BOOLEAN",
        }
    }
}

impl std::str::FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "timestamp" => Ok(ColumnType::Timestamp),
            "integer" => Ok(ColumnType::Integer),
            "text" => Ok(ColumnType::Text),
            "real" => Ok(ColumnType::Real),
            "boolean" => Ok(ColumnType::Boolean),
            _ => Err(format!("Unknown column type: {}", s)),
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Timestamp => write!(f, "timestamp"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Real => write!(f, "real"),
            ColumnType::Boolean => write!(f, "boolean"),
        }
    }
}

/// One column of one table, as declared in the schema catalog
///
/// # Example
///
/// ```rust
/// use mood_dash_etl::models::{ColumnSpec, ColumnType};
///
/// let column = ColumnSpec::new("mood_group_id", ColumnType::Integer, "dimension");
/// assert_eq!(column.target_type.sql_type(), "BIGINT");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name, as it appears in the backup and in the store
    pub name: String,
    /// Type the raw value is coerced to
    #[serde(rename = "type", alias = "type_name")]
    pub target_type: ColumnType,
    /// Free-form classification carried through from the catalog
    #[serde(default)]
    pub kind: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, target_type: ColumnType, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_type,
            kind: kind.into(),
        }
    }

    pub fn is_timestamp(&self) -> bool {
        self.target_type == ColumnType::Timestamp
    }
}
