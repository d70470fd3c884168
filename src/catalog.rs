//! Schema catalog loaded from `table_info.json`
//!
//! The catalog file is a JSON object mapping each table name to an ordered
//! array of `{name, type, kind}` column declarations. It is read once per run,
//! validated eagerly, and then only consulted through [`SchemaCatalog::schema`].

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{EtlError, EtlResult};
use crate::models::{ColumnSpec, TableSchema};

/// Immutable in-memory view of the schema catalog
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: HashMap<String, TableSchema>,
}

impl SchemaCatalog {
    /// Load the catalog from a file
    ///
    /// Fails with [`EtlError::SchemaNotFound`] when the file does not exist and
    /// with [`EtlError::InvalidSchema`] when an entry is malformed.
    pub fn load(path: &Path) -> EtlResult<Self> {
        if !path.exists() {
            tracing::error!("Column info file {} does not exist", path.display());
            return Err(EtlError::SchemaNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| EtlError::io(path, e))?;
        let catalog = Self::parse(&content)?;
        tracing::debug!(
            "Loaded schema catalog with {} tables from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Parse a catalog from its JSON text
    pub fn parse(content: &str) -> EtlResult<Self> {
        let declared: HashMap<String, Vec<ColumnSpec>> = serde_json::from_str(content)
            .map_err(|e| EtlError::InvalidSchema(e.to_string()))?;

        let mut tables = HashMap::with_capacity(declared.len());
        for (name, columns) in declared {
            let mut seen = HashSet::new();
            for column in &columns {
                if !seen.insert(column.name.as_str()) {
                    return Err(EtlError::InvalidSchema(format!(
                        "table '{}' declares column '{}' more than once",
                        name, column.name
                    )));
                }
            }
            tables.insert(name.clone(), TableSchema::new(name, columns));
        }

        Ok(Self { tables })
    }

    /// Build a catalog from schemas already in memory
    pub fn from_schemas(schemas: impl IntoIterator<Item = TableSchema>) -> Self {
        Self {
            tables: schemas
                .into_iter()
                .map(|schema| (schema.name.clone(), schema))
                .collect(),
        }
    }

    /// Look up the schema for a table
    pub fn schema(&self, table_name: &str) -> EtlResult<&TableSchema> {
        self.tables
            .get(table_name)
            .ok_or_else(|| EtlError::UnknownTable(table_name.to_string()))
    }

    pub fn contains(&self, table_name: &str) -> bool {
        self.tables.contains_key(table_name)
    }

    /// Declared table names, sorted
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
