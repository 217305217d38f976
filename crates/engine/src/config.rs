//! Store configuration
//!
//! A [`StoreConfig`] is immutable and always validated: the only ways to get
//! one are [`StoreConfigBuilder::build`] and the TOML/serde loaders, which go
//! through the builder.
//!
//! # Example
//!
//! ```toml
//! table = "users"
//! id_path = "id"
//! revision_path = "rev"
//! batch_size = 500
//!
//! [[columns]]
//! name = "email"
//! path = "email"
//! unique = true
//! ```

use docstore_core::{Error, JsonPath, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::projection::{
    ColumnDef, ColumnKind, ColumnProjection, ColumnType, IndexDef, ProjectionPolicy, TableLayout,
    BODY_COLUMN, ID_COLUMN, RESERVED_COLUMNS, REVISION_COLUMN, SEQ_ID_COLUMN,
};

/// Default page size for batched iteration
pub const DEFAULT_BATCH_SIZE: usize = 1000;
/// Default number of ids per `IN (...)` lookup
pub const DEFAULT_ID_BATCH_SIZE: usize = 100;
/// Default maximum serialized body size (a MySQL `TEXT` column)
pub const DEFAULT_MAX_BODY_SIZE: usize = 65_535;

/// How ids are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdEncoding {
    /// UTF-8 text column
    #[default]
    Text,
    /// Binary column; shown as lowercase hex in bodies and criteria
    Binary,
}

/// Validated, immutable store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoreConfigBuilder")]
pub struct StoreConfig {
    table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_path: Option<JsonPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revision_path: Option<JsonPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seq_id_path: Option<JsonPath>,
    id_encoding: IdEncoding,
    columns: Vec<ColumnProjection>,
    batch_size: usize,
    id_batch_size: usize,
    max_body_size: usize,
}

impl StoreConfig {
    /// Start building a configuration for `table`
    pub fn builder(table: impl Into<String>) -> StoreConfigBuilder {
        StoreConfigBuilder::new(table)
    }

    /// Parse and validate a TOML description
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let builder: StoreConfigBuilder =
            toml::from_str(s).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        builder.build()
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Body path the id is reinjected at, if any
    pub fn id_path(&self) -> Option<&JsonPath> {
        self.id_path.as_ref()
    }

    /// Body path the revision is reinjected at, if any
    pub fn revision_path(&self) -> Option<&JsonPath> {
        self.revision_path.as_ref()
    }

    /// Body path the sequence id is reinjected at, if any
    pub fn seq_id_path(&self) -> Option<&JsonPath> {
        self.seq_id_path.as_ref()
    }

    /// Id storage encoding
    pub fn id_encoding(&self) -> IdEncoding {
        self.id_encoding
    }

    /// Column projections
    pub fn columns(&self) -> &[ColumnProjection] {
        &self.columns
    }

    /// Page size for batched iteration; 0 means unbatched
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Ids per `IN (...)` lookup
    pub fn id_batch_size(&self) -> usize {
        self.id_batch_size
    }

    /// Maximum serialized body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// True if any projection carries a unique index
    pub fn has_unique_columns(&self) -> bool {
        self.columns.iter().any(|c| c.unique)
    }

    /// Projection by column name
    pub fn column(&self, name: &str) -> Option<&ColumnProjection> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns and indexes a table for this configuration must provide
    pub fn table_layout(&self) -> TableLayout {
        let mut columns = vec![
            ColumnDef {
                name: SEQ_ID_COLUMN.to_string(),
                kind: ColumnKind::SeqId,
            },
            ColumnDef {
                name: ID_COLUMN.to_string(),
                kind: ColumnKind::Id {
                    binary: self.id_encoding == IdEncoding::Binary,
                },
            },
            ColumnDef {
                name: BODY_COLUMN.to_string(),
                kind: ColumnKind::Body {
                    max_size: self.max_body_size,
                },
            },
            ColumnDef {
                name: REVISION_COLUMN.to_string(),
                kind: ColumnKind::Revision,
            },
        ];
        let mut indexes = Vec::new();
        for projection in &self.columns {
            columns.push(ColumnDef {
                name: projection.name.clone(),
                kind: ColumnKind::Projection(projection.column_type),
            });
            if projection.unique || projection.indexed {
                indexes.push(IndexDef {
                    name: TableLayout::index_name(&self.table, &projection.name),
                    column: projection.name.clone(),
                    unique: projection.unique,
                });
            }
        }
        TableLayout {
            table: self.table.clone(),
            columns,
            indexes,
        }
    }

    /// Configured id/revision/sequence-id paths
    pub(crate) fn meta_paths(&self) -> impl Iterator<Item = &JsonPath> {
        self.id_path
            .iter()
            .chain(self.revision_path.iter())
            .chain(self.seq_id_path.iter())
    }
}

/// Fluent builder for [`StoreConfig`]
///
/// Path arguments are parsed eagerly but errors are reported by
/// [`build`](Self::build), so a chain never has to be interrupted.
///
/// # Examples
///
/// ```
/// use docstore_engine::{ColumnProjection, StoreConfig};
///
/// let config = StoreConfig::builder("users")
///     .id_path("id")
///     .revision_path("rev")
///     .column(ColumnProjection::new("email").unique())
///     .batch_size(250)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size(), 250);
/// assert!(config.has_unique_columns());
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfigBuilder {
    table: String,
    id_path: Option<JsonPath>,
    revision_path: Option<JsonPath>,
    seq_id_path: Option<JsonPath>,
    id_encoding: IdEncoding,
    columns: Vec<ColumnProjection>,
    batch_size: usize,
    id_batch_size: usize,
    max_body_size: usize,
    #[serde(skip)]
    errors: Vec<String>,
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        StoreConfigBuilder {
            table: String::new(),
            id_path: None,
            revision_path: None,
            seq_id_path: None,
            id_encoding: IdEncoding::Text,
            columns: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            id_batch_size: DEFAULT_ID_BATCH_SIZE,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            errors: Vec::new(),
        }
    }
}

impl StoreConfigBuilder {
    /// Builder with defaults for `table`
    pub fn new(table: impl Into<String>) -> Self {
        StoreConfigBuilder {
            table: table.into(),
            ..Default::default()
        }
    }

    fn parse_path(&mut self, what: &str, path: &str) -> Option<JsonPath> {
        match path.parse() {
            Ok(p) => Some(p),
            Err(e) => {
                self.errors.push(format!("invalid {} '{}': {}", what, path, e));
                None
            }
        }
    }

    /// Reinject the id into bodies at `path`
    pub fn id_path(mut self, path: &str) -> Self {
        self.id_path = self.parse_path("id path", path);
        self
    }

    /// Reinject the revision into bodies at `path`
    pub fn revision_path(mut self, path: &str) -> Self {
        self.revision_path = self.parse_path("revision path", path);
        self
    }

    /// Reinject the sequence id into bodies at `path`
    pub fn seq_id_path(mut self, path: &str) -> Self {
        self.seq_id_path = self.parse_path("sequence id path", path);
        self
    }

    /// Id storage encoding
    pub fn id_encoding(mut self, encoding: IdEncoding) -> Self {
        self.id_encoding = encoding;
        self
    }

    /// Add a column projection
    pub fn column(mut self, projection: ColumnProjection) -> Self {
        self.columns.push(projection);
        self
    }

    /// Page size for batched iteration; 0 disables batching
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Ids per `IN (...)` lookup
    pub fn id_batch_size(mut self, size: usize) -> Self {
        self.id_batch_size = size;
        self
    }

    /// Maximum serialized body size in bytes
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<StoreConfig> {
        if let Some(first) = self.errors.first() {
            return Err(Error::InvalidConfig(first.clone()));
        }
        if self.table.trim().is_empty() {
            return Err(Error::InvalidConfig("table name must not be empty".into()));
        }
        if self.id_batch_size < 1 {
            return Err(Error::InvalidConfig("id_batch_size must be at least 1".into()));
        }
        if self.max_body_size < 1 {
            return Err(Error::InvalidConfig("max_body_size must be at least 1".into()));
        }

        let meta: Vec<(&str, &JsonPath)> = [
            ("id path", self.id_path.as_ref()),
            ("revision path", self.revision_path.as_ref()),
            ("sequence id path", self.seq_id_path.as_ref()),
        ]
        .into_iter()
        .filter_map(|(what, p)| p.map(|p| (what, p)))
        .collect();

        for (i, (what, path)) in meta.iter().enumerate() {
            if path.is_root() {
                return Err(Error::InvalidConfig(format!("{} must not be the root", what)));
            }
            if let Some((other, _)) = meta[i + 1..].iter().find(|(_, p)| p.overlaps(path)) {
                return Err(Error::InvalidConfig(format!(
                    "{} '{}' overlaps the {}",
                    what, path, other
                )));
            }
        }

        let mut names = HashSet::new();
        for column in &self.columns {
            if column.name.is_empty() {
                return Err(Error::InvalidConfig("column name must not be empty".into()));
            }
            if RESERVED_COLUMNS.contains(&column.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "column name '{}' is reserved",
                    column.name
                )));
            }
            if !names.insert(column.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
            if column.path.is_root() {
                return Err(Error::InvalidConfig(format!(
                    "column '{}' must not project the root",
                    column.name
                )));
            }
            if let Some((what, _)) = meta.iter().find(|(_, p)| p.overlaps(&column.path)) {
                return Err(Error::InvalidConfig(format!(
                    "column '{}' path '{}' overlaps the {}",
                    column.name, column.path, what
                )));
            }
            // typed columns coerce, so only JSON text gives the value back
            let extracted = column.policy == ProjectionPolicy::Extract;
            if extracted && column.column_type != ColumnType::Json {
                return Err(Error::InvalidConfig(format!(
                    "extracted column '{}' must have column_type json",
                    column.name
                )));
            }
        }

        // an extracted subtree is gone from the body, so nothing else may read it
        for (i, column) in self.columns.iter().enumerate() {
            let clash = self.columns[i + 1..].iter().find(|other| {
                other.path.overlaps(&column.path)
                    && (column.policy == ProjectionPolicy::Extract
                        || other.policy == ProjectionPolicy::Extract)
            });
            if let Some(other) = clash {
                return Err(Error::InvalidConfig(format!(
                    "columns '{}' and '{}' overlap and one of them is extracted",
                    column.name, other.name
                )));
            }
        }

        Ok(StoreConfig {
            table: self.table,
            id_path: self.id_path,
            revision_path: self.revision_path,
            seq_id_path: self.seq_id_path,
            id_encoding: self.id_encoding,
            columns: self.columns,
            batch_size: self.batch_size,
            id_batch_size: self.id_batch_size,
            max_body_size: self.max_body_size,
        })
    }
}

impl TryFrom<StoreConfigBuilder> for StoreConfig {
    type Error = Error;

    fn try_from(builder: StoreConfigBuilder) -> Result<Self> {
        builder.build()
    }
}
