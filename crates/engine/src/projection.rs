//! Column projections
//!
//! A projection mirrors one body field into a real table column so it can be
//! indexed, constrained unique, or filtered without JSON extraction.

use docstore_core::{fallback_at_path, get_or, set_at_path, JsonPath};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::SqlValue;

/// Storage type of a projected column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Text; numbers and booleans are stored as their JSON text
    #[default]
    Text,
    /// 64-bit integer
    Integer,
    /// Double precision float
    Real,
    /// Arbitrary JSON, stored as JSON text
    Json,
}

impl ColumnType {
    /// Convert a body value into the column's storage value
    ///
    /// Values that cannot be represented (e.g. a non-numeric string in an
    /// integer column) become NULL.
    pub fn encode(&self, value: &Value) -> SqlValue {
        if value.is_null() {
            return SqlValue::Null;
        }
        match self {
            ColumnType::Text => match value {
                Value::String(s) => SqlValue::Text(s.clone()),
                other => SqlValue::Text(other.to_string()),
            },
            ColumnType::Integer => match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .map(SqlValue::Integer)
                    .unwrap_or(SqlValue::Null),
                Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
                Value::String(s) => s.trim().parse().map(SqlValue::Integer).unwrap_or(SqlValue::Null),
                _ => SqlValue::Null,
            },
            ColumnType::Real => match value {
                Value::Number(n) => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
                Value::Bool(b) => SqlValue::Real(if *b { 1.0 } else { 0.0 }),
                Value::String(s) => s.trim().parse().map(SqlValue::Real).unwrap_or(SqlValue::Null),
                _ => SqlValue::Null,
            },
            ColumnType::Json => SqlValue::Text(value.to_string()),
        }
    }

    /// Convert a stored column value back into a body value
    pub fn decode(&self, value: &SqlValue) -> Value {
        match (self, value) {
            (_, SqlValue::Null) => Value::Null,
            (ColumnType::Json, SqlValue::Text(s)) => {
                serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone()))
            }
            (_, SqlValue::Integer(i)) => Value::from(*i),
            (_, SqlValue::Real(r)) => serde_json::Number::from_f64(*r)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            (_, SqlValue::Text(s)) => Value::String(s.clone()),
            (_, SqlValue::Blob(b)) => Value::String(hex::encode(b)),
        }
    }

    /// SQL type name used by DDL
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text | ColumnType::Json => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
        }
    }
}

/// How the projected field relates to the body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionPolicy {
    /// Copy: the field stays in the body
    #[default]
    KeepInBody,
    /// Move: the field is removed from the body and lives only in the column
    ///
    /// Requires [`ColumnType::Json`] so the value comes back unchanged.
    Extract,
    /// Copy, and on read restore the field from the column if the body lacks it
    LoadFallback,
}

/// One projected column
///
/// # Examples
///
/// ```
/// use docstore_engine::{ColumnProjection, ColumnType};
///
/// let email = ColumnProjection::new("email").unique();
/// assert_eq!(email.path.to_string(), "email");
///
/// let age = ColumnProjection::new("age")
///     .at("profile.age".parse().unwrap())
///     .column_type(ColumnType::Integer)
///     .indexed();
/// assert!(age.indexed);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProjection {
    /// Column name
    pub name: String,
    /// Source path in the body
    pub path: JsonPath,
    /// Storage type
    #[serde(default)]
    pub column_type: ColumnType,
    /// Relationship to the body
    #[serde(default)]
    pub policy: ProjectionPolicy,
    /// Value used when the source path is absent
    #[serde(default)]
    pub default: Value,
    /// Backed by a unique index
    #[serde(default)]
    pub unique: bool,
    /// Backed by a plain index (ignored when `unique`)
    #[serde(default)]
    pub indexed: bool,
}

impl ColumnProjection {
    /// Text column named `name`, sourced from the top-level field of the same name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        ColumnProjection {
            path: JsonPath::root().key(name.clone()),
            name,
            column_type: ColumnType::Text,
            policy: ProjectionPolicy::KeepInBody,
            default: Value::Null,
            unique: false,
            indexed: false,
        }
    }

    /// Source the column from `path`
    pub fn at(mut self, path: JsonPath) -> Self {
        self.path = path;
        self
    }

    /// Set the storage type
    pub fn column_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    /// Set the body policy
    pub fn policy(mut self, policy: ProjectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shorthand for [`ProjectionPolicy::Extract`] on a JSON column
    pub fn extract(self) -> Self {
        self.policy(ProjectionPolicy::Extract)
            .column_type(ColumnType::Json)
    }

    /// Shorthand for [`ProjectionPolicy::LoadFallback`]
    pub fn load_fallback(self) -> Self {
        self.policy(ProjectionPolicy::LoadFallback)
    }

    /// Value stored when the source path is absent
    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// Add a unique index
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Add a plain index
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Column value derived from a full (pre-extraction) body
    pub fn value_from(&self, body: &Value) -> SqlValue {
        self.column_type
            .encode(&get_or(body, &self.path, self.default.clone()))
    }

    /// Apply the read-side policy to a body loaded from storage
    pub fn restore_into(&self, body: &mut Value, stored: &SqlValue) {
        match self.policy {
            ProjectionPolicy::KeepInBody => {}
            // a NULL column leaves the body alone: rows written before the
            // projection existed still carry the field there
            ProjectionPolicy::Extract => {
                if !stored.is_null() {
                    set_at_path(body, &self.path, self.column_type.decode(stored));
                } else if !self.default.is_null() {
                    fallback_at_path(body, &self.path, self.default.clone());
                }
            }
            ProjectionPolicy::LoadFallback => {
                let value = if stored.is_null() {
                    self.default.clone()
                } else {
                    self.column_type.decode(stored)
                };
                fallback_at_path(body, &self.path, value);
            }
        }
    }
}

// =============================================================================
// Table layout
// =============================================================================

/// Sequence id column name
pub const SEQ_ID_COLUMN: &str = "seq_id";
/// Id column name
pub const ID_COLUMN: &str = "id";
/// Body column name
pub const BODY_COLUMN: &str = "body";
/// Revision column name
pub const REVISION_COLUMN: &str = "revision";

/// Column names the engine owns
pub const RESERVED_COLUMNS: [&str; 4] = [SEQ_ID_COLUMN, ID_COLUMN, BODY_COLUMN, REVISION_COLUMN];

/// What a layout column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Auto-increment primary key
    SeqId,
    /// Unique id; binary when true
    Id {
        /// Stored as raw bytes
        binary: bool,
    },
    /// Serialized document
    Body {
        /// Maximum serialized size in bytes
        max_size: usize,
    },
    /// Revision counter, default 1
    Revision,
    /// Projected column
    Projection(ColumnType),
}

/// A column the table must have
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Role and type
    pub kind: ColumnKind,
}

/// An index the table must have
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name
    pub name: String,
    /// Indexed column
    pub column: String,
    /// Unique index
    pub unique: bool,
}

/// Columns and indexes a store expects its table to provide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    /// Table name
    pub table: String,
    /// Columns in declaration order
    pub columns: Vec<ColumnDef>,
    /// Indexes beyond the primary key and the id column's unique constraint
    pub indexes: Vec<IndexDef>,
}

impl TableLayout {
    /// Index name used for a projection column
    ///
    /// Prefixed with the table because some backends scope index names to
    /// the database rather than the table.
    pub fn index_name(table: &str, column: &str) -> String {
        format!("{}_{}", table, column)
    }

    /// Projection column definitions
    pub fn projection_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns
            .iter()
            .filter(|c| matches!(c.kind, ColumnKind::Projection(_)))
    }
}
