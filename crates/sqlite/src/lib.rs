//! SQLite driver for docstore
//!
//! [`SqliteConnection`] implements the engine's [`Connection`] contract over
//! a single `rusqlite` connection (bundled SQLite, so `json_extract`,
//! `unhex` and upserts are always available). It also owns the DDL path:
//! [`SqliteConnection::create_table`] materialises a [`TableLayout`].

#![warn(missing_docs)]
#![warn(clippy::all)]

use docstore_engine::{
    BackendError, ColumnKind, CommandResult, Connection, Dialect, ErrorClass, QueryResult, Row,
    SqlValue, SqliteDialect, Statement, TableLayout,
};
use parking_lot::Mutex;
use rusqlite::types::{Value, ValueRef};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const UNIQUE_FAILED: &str = "UNIQUE constraint failed: ";

fn backend_error(e: rusqlite::Error) -> BackendError {
    BackendError::new(e.to_string())
}

fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Real(r) => Value::Real(*r),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(b) => Value::Blob(b.clone()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Result<SqlValue, BackendError> {
    Ok(match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(r) => SqlValue::Real(r),
        ValueRef::Text(t) => SqlValue::Text(
            String::from_utf8(t.to_vec())
                .map_err(|e| BackendError::new(format!("text column is not UTF-8: {}", e)))?,
        ),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    })
}

/// A SQLite database behind a mutex
pub struct SqliteConnection {
    inner: Mutex<rusqlite::Connection>,
    dialect: SqliteDialect,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection").finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Wrap an open `rusqlite` connection
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        SqliteConnection {
            inner: Mutex::new(conn),
            dialect: SqliteDialect,
        }
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, BackendError> {
        rusqlite::Connection::open_in_memory()
            .map(Self::from_connection)
            .map_err(backend_error)
    }

    /// Database file at `path`, created if missing
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        rusqlite::Connection::open(path)
            .map(Self::from_connection)
            .map_err(backend_error)
    }

    /// Create the table, missing projection columns and indexes of `layout`
    ///
    /// Safe to call repeatedly: existing tables gain the projection columns
    /// they lack, which is what a backfill needs after adding projections.
    pub fn create_table(&self, layout: &TableLayout) -> Result<(), BackendError> {
        let q = |ident: &str| self.dialect.quote_ident(ident);
        let table = q(&layout.table);

        let definitions: Vec<String> = layout
            .columns
            .iter()
            .map(|column| {
                let name = q(&column.name);
                match column.kind {
                    ColumnKind::SeqId => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name),
                    ColumnKind::Id { binary: true } => format!("{} BLOB NOT NULL UNIQUE", name),
                    ColumnKind::Id { binary: false } => format!("{} TEXT NOT NULL UNIQUE", name),
                    // SQLite does not enforce declared sizes; the engine checks the limit
                    ColumnKind::Body { .. } => format!("{} TEXT NOT NULL", name),
                    ColumnKind::Revision => format!("{} INTEGER NOT NULL DEFAULT 1", name),
                    ColumnKind::Projection(ty) => format!("{} {}", name, ty.sql_type()),
                }
            })
            .collect();

        self.command(&Statement::new(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            table,
            definitions.join(", ")
        )))?;

        let existing = self.table_columns(&layout.table)?;
        for column in layout.projection_columns() {
            if existing.iter().any(|c| c == &column.name) {
                continue;
            }
            if let ColumnKind::Projection(ty) = column.kind {
                debug!(target: "docstore::sqlite", table = %layout.table, column = %column.name, "adding column");
                self.command(&Statement::new(format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table,
                    q(&column.name),
                    ty.sql_type()
                )))?;
            }
        }

        for index in &layout.indexes {
            self.command(&Statement::new(format!(
                "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
                if index.unique { "UNIQUE " } else { "" },
                q(&index.name),
                table,
                q(&index.column)
            )))?;
        }
        Ok(())
    }

    /// Column names of `table`, empty if it does not exist
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>, BackendError> {
        let result = self.query(&Statement::new(format!(
            "PRAGMA table_info({})",
            self.dialect.quote_ident(table)
        )))?;
        Ok(result
            .iterate()
            .filter_map(|row| row.get("name").and_then(SqlValue::as_text).map(str::to_string))
            .collect())
    }

    /// Drop `table` if it exists
    pub fn drop_table(&self, table: &str) -> Result<(), BackendError> {
        self.command(&Statement::new(format!(
            "DROP TABLE IF EXISTS {}",
            self.dialect.quote_ident(table)
        )))?;
        Ok(())
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn escape(&self, text: &str) -> String {
        text.replace('\'', "''")
    }

    fn query(&self, statement: &Statement) -> Result<QueryResult, BackendError> {
        let conn = self.inner.lock();
        let mut prepared = conn.prepare(&statement.sql).map_err(backend_error)?;
        let columns: Arc<[String]> = prepared
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into();

        let mut rows = prepared
            .query(rusqlite::params_from_iter(statement.params.iter().map(to_sqlite)))
            .map_err(backend_error)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(backend_error)? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map_err(backend_error).and_then(from_sqlite))
                .collect::<Result<Vec<_>, _>>()?;
            out.push(Row::new(columns.clone(), values));
        }
        Ok(QueryResult::new(out))
    }

    fn command(&self, statement: &Statement) -> Result<CommandResult, BackendError> {
        let conn = self.inner.lock();
        let affected = conn
            .execute(
                &statement.sql,
                rusqlite::params_from_iter(statement.params.iter().map(to_sqlite)),
            )
            .map_err(backend_error)?;
        Ok(CommandResult {
            affected_rows: affected as u64,
            last_insert_id: Some(conn.last_insert_rowid()),
        })
    }

    /// Recognise `UNIQUE constraint failed: <table>.<column>`
    ///
    /// SQLite does not report the offending value.
    fn classify_error(&self, error: &BackendError) -> ErrorClass {
        match error.message.find(UNIQUE_FAILED) {
            Some(at) => {
                let rest = &error.message[at + UNIQUE_FAILED.len()..];
                let key = rest.split(", ").next().unwrap_or(rest).trim();
                ErrorClass::Duplicate {
                    key: key.to_string(),
                    value: None,
                }
            }
            None => ErrorClass::Other,
        }
    }
}
