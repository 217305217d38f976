//! SQL dialects
//!
//! Everything that differs between backends in the statements the engine
//! issues is rendered through [`Dialect`]. Placeholders are always `?`.

use docstore_core::{JsonPath, PathSegment};
use serde_json::Value;
use std::fmt::Debug;

use crate::backend::SqlValue;

/// Backend-specific SQL rendering
pub trait Dialect: Debug + Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column or index name)
    fn quote_ident(&self, ident: &str) -> String;

    /// JSON path literal text for `path`, e.g. `$."address"."city"[0]`
    ///
    /// The result is raw text; callers escape and quote it before inlining.
    fn json_path(&self, path: &JsonPath) -> String {
        let mut out = String::from("$");
        for segment in path.segments() {
            match segment {
                PathSegment::Key(k) => {
                    out.push_str(".\"");
                    out.push_str(k);
                    out.push('"');
                }
                PathSegment::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    /// Scalar extraction of a JSON path from a column
    ///
    /// `path_literal` is an already quoted SQL string literal.
    fn json_extract(&self, column: &str, path_literal: &str) -> String;

    /// Decode a hex-encoded bound value into the binary id representation
    fn decode_hex(&self, placeholder: &str) -> String;

    /// Bound value used when comparing a JSON extraction against `value`
    fn json_constant(&self, value: &Value) -> SqlValue {
        SqlValue::from_json(value)
    }

    /// Atomic insert-or-update keyed on `id_column`
    ///
    /// Inserts `columns` (one placeholder each). On an id collision every
    /// column in `update_columns` is replaced with the attempted value and
    /// `revision_column` is incremented by one.
    fn upsert(
        &self,
        table: &str,
        columns: &[&str],
        id_column: &str,
        update_columns: &[&str],
        revision_column: &str,
    ) -> String;

    /// `LIMIT` clause for a window of `count` rows after skipping `offset`
    fn limit(&self, offset: u64, count: u64) -> String;

    /// Statement opening a transaction
    fn begin_transaction(&self) -> &'static str;

    /// Statement committing a transaction
    fn commit(&self) -> &'static str {
        "COMMIT"
    }

    /// Statement rolling back a transaction
    fn rollback(&self) -> &'static str {
        "ROLLBACK"
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn quoted_list(dialect: &dyn Dialect, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| dialect.quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// MySQL / MariaDB
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn json_extract(&self, column: &str, path_literal: &str) -> String {
        format!("JSON_UNQUOTE(JSON_EXTRACT({}, {}))", column, path_literal)
    }

    fn decode_hex(&self, placeholder: &str) -> String {
        format!("UNHEX({})", placeholder)
    }

    fn json_constant(&self, value: &Value) -> SqlValue {
        // JSON_UNQUOTE renders booleans as the text `true` / `false`
        match value {
            Value::Bool(b) => SqlValue::Text(b.to_string()),
            other => SqlValue::from_json(other),
        }
    }

    fn upsert(
        &self,
        table: &str,
        columns: &[&str],
        _id_column: &str,
        update_columns: &[&str],
        revision_column: &str,
    ) -> String {
        let rev = self.quote_ident(revision_column);
        let mut assignments: Vec<String> = update_columns
            .iter()
            .map(|c| {
                let c = self.quote_ident(c);
                format!("{} = VALUES({})", c, c)
            })
            .collect();
        assignments.push(format!("{} = {} + 1", rev, rev));
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
            self.quote_ident(table),
            quoted_list(self, columns),
            placeholders(columns.len()),
            assignments.join(", ")
        )
    }

    fn limit(&self, offset: u64, count: u64) -> String {
        if offset == 0 {
            format!("LIMIT {}", count)
        } else {
            format!("LIMIT {}, {}", offset, count)
        }
    }

    fn begin_transaction(&self) -> &'static str {
        "START TRANSACTION"
    }
}

/// SQLite 3.24+ (upsert support)
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn json_extract(&self, column: &str, path_literal: &str) -> String {
        format!("json_extract({}, {})", column, path_literal)
    }

    fn decode_hex(&self, placeholder: &str) -> String {
        format!("unhex({})", placeholder)
    }

    fn upsert(
        &self,
        table: &str,
        columns: &[&str],
        id_column: &str,
        update_columns: &[&str],
        revision_column: &str,
    ) -> String {
        let table_q = self.quote_ident(table);
        let rev = self.quote_ident(revision_column);
        let mut assignments: Vec<String> = update_columns
            .iter()
            .map(|c| {
                let c = self.quote_ident(c);
                format!("{} = excluded.{}", c, c)
            })
            .collect();
        assignments.push(format!("{} = {}.{} + 1", rev, table_q, rev));
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
            table_q,
            quoted_list(self, columns),
            placeholders(columns.len()),
            self.quote_ident(id_column),
            assignments.join(", ")
        )
    }

    fn limit(&self, offset: u64, count: u64) -> String {
        if offset == 0 {
            format!("LIMIT {}", count)
        } else {
            format!("LIMIT {} OFFSET {}", count, offset)
        }
    }

    fn begin_transaction(&self) -> &'static str {
        "BEGIN"
    }
}
