//! Backend execution contract
//!
//! The engine never talks to a database driver directly. It builds
//! [`Statement`]s (SQL text with `?` placeholders plus bound values) and hands
//! them to a [`Connection`], which offers exactly three capabilities:
//! escaping inline literals, running a query, running a command. The driver
//! also reports its SQL [`Dialect`] and classifies its own errors, so the
//! brittle "is this a duplicate key?" text matching lives with the driver.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::dialect::Dialect;

// =============================================================================
// Values and statements
// =============================================================================

/// A value bound to, or read from, a SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// 64-bit integer
    Integer(i64),
    /// Double precision float
    Real(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Map a JSON scalar to its natural SQL value
    ///
    /// Booleans become 0/1 (that is what JSON extraction yields on the
    /// supported backends), arrays and objects become their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }

    /// True for [`SqlValue::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer view; reals are not truncated
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Text view of a text or UTF-8 blob value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            SqlValue::Blob(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Byte view of a text or blob value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Text(s) => Some(s.as_bytes()),
            SqlValue::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::Blob(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

/// SQL text with positional `?` placeholders and their bound values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    /// SQL text
    pub sql: String,
    /// Values for the placeholders, in order
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Statement without parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Statement {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Statement with parameters
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Statement {
            sql: sql.into(),
            params,
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// One result row; values are addressed by column name
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Build a row; `values` must line up with `columns`
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Row { columns, values }
    }

    /// Value of the named column
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

/// Rows returned by [`Connection::query`]
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    rows: Vec<Row>,
}

impl QueryResult {
    /// Wrap fetched rows
    pub fn new(rows: Vec<Row>) -> Self {
        QueryResult { rows }
    }

    /// Consume as a row iterator
    pub fn iterate(self) -> std::vec::IntoIter<Row> {
        self.rows.into_iter()
    }

    /// First row, if any
    pub fn fetch_one(self) -> Option<Row> {
        self.rows.into_iter().next()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if no rows were returned
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of [`Connection::command`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandResult {
    /// Rows inserted, updated or deleted
    pub affected_rows: u64,
    /// Auto-increment value of the last insert, if the driver reports it
    pub last_insert_id: Option<i64>,
}

// =============================================================================
// Errors
// =============================================================================

/// Failure reported by a driver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    /// Driver's native error text
    pub message: String,
}

impl BackendError {
    /// Create from the driver's message
    pub fn new(message: impl Into<String>) -> Self {
        BackendError {
            message: message.into(),
        }
    }
}

impl From<BackendError> for docstore_core::Error {
    fn from(e: BackendError) -> Self {
        docstore_core::Error::storage(e.message)
    }
}

/// What a driver recognised in one of its errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// A unique key rejected a write
    Duplicate {
        /// Key (index or column) as the backend names it, possibly
        /// qualified with the table name
        key: String,
        /// Offending value, if the backend reports it
        value: Option<String>,
    },
    /// Anything else
    Other,
}

static MYSQL_DUPLICATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Duplicate entry '(?s)(.*)' for key '([^']+)'").expect("static regex")
});

/// Classify a MySQL/MariaDB error message
///
/// Recognises `Duplicate entry '<value>' for key '<key>'` (error 1062).
pub fn classify_mysql_error(error: &BackendError) -> ErrorClass {
    match MYSQL_DUPLICATE.captures(&error.message) {
        Some(caps) => ErrorClass::Duplicate {
            key: caps[2].to_string(),
            value: Some(caps[1].to_string()),
        },
        None => ErrorClass::Other,
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Minimal relational execution capability supplied by a driver
pub trait Connection {
    /// SQL dialect spoken by this connection
    fn dialect(&self) -> &dyn Dialect;

    /// Escape `text` for use inside a single-quoted SQL literal
    fn escape(&self, text: &str) -> String;

    /// Run a statement that returns rows
    fn query(&self, statement: &Statement) -> Result<QueryResult, BackendError>;

    /// Run a statement that modifies data or schema
    fn command(&self, statement: &Statement) -> Result<CommandResult, BackendError>;

    /// Recognise duplicate-key failures in this driver's errors
    fn classify_error(&self, _error: &BackendError) -> ErrorClass {
        ErrorClass::Other
    }
}

impl<C: Connection + ?Sized> Connection for Arc<C> {
    fn dialect(&self) -> &dyn Dialect {
        (**self).dialect()
    }

    fn escape(&self, text: &str) -> String {
        (**self).escape(text)
    }

    fn query(&self, statement: &Statement) -> Result<QueryResult, BackendError> {
        (**self).query(statement)
    }

    fn command(&self, statement: &Statement) -> Result<CommandResult, BackendError> {
        (**self).command(statement)
    }

    fn classify_error(&self, error: &BackendError) -> ErrorClass {
        (**self).classify_error(error)
    }
}
