//! Row codec
//!
//! Converts a document tree into the values written to a row, and a fetched
//! row back into a document tree.
//!
//! Writing: projections are computed from the full tree first, then the
//! id/revision/sequence-id paths and `Extract` projections are stripped and
//! the rest is serialized as the body.
//!
//! Reading: the body is parsed, projections restore their fields, then the
//! id, revision and sequence id are injected at their configured paths.

use docstore_core::{extract_at_path, set_at_path, DocId, Error, Result};
use serde_json::Value;

use crate::backend::{Row, SqlValue};
use crate::config::{IdEncoding, StoreConfig};
use crate::dialect::Dialect;
use crate::projection::{
    ProjectionPolicy, BODY_COLUMN, ID_COLUMN, REVISION_COLUMN, SEQ_ID_COLUMN,
};

/// Values for one row write
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EncodedRow {
    /// Serialized body
    pub body: String,
    /// Projection values, aligned with the configured columns
    pub columns: Vec<SqlValue>,
}

/// Storage value of an id
pub(crate) fn id_value(config: &StoreConfig, id: &DocId) -> Result<SqlValue> {
    match config.id_encoding() {
        IdEncoding::Text => id
            .as_str()
            .map(|s| SqlValue::Text(s.to_string()))
            .ok_or_else(|| {
                Error::InvalidDataType(format!(
                    "id 0x{} is not valid UTF-8 and the store uses text ids",
                    id.to_hex()
                ))
            }),
        IdEncoding::Binary => Ok(SqlValue::Blob(id.as_bytes().to_vec())),
    }
}

/// Display form of an id as it appears in bodies and errors
pub(crate) fn id_display(config: &StoreConfig, id: &DocId) -> String {
    match config.id_encoding() {
        IdEncoding::Text => id.to_string(),
        IdEncoding::Binary => id.to_hex(),
    }
}

/// Encode a full document tree for writing
pub(crate) fn encode_tree(config: &StoreConfig, mut tree: Value) -> Result<EncodedRow> {
    if !tree.is_object() {
        return Err(Error::InvalidDataType(format!(
            "document must serialize to a JSON object, got {}",
            kind_of(&tree)
        )));
    }

    let columns = config.columns().iter().map(|c| c.value_from(&tree)).collect();

    for path in config.meta_paths() {
        extract_at_path(&mut tree, path, Value::Null);
    }
    for column in config.columns() {
        if column.policy == ProjectionPolicy::Extract {
            extract_at_path(&mut tree, &column.path, Value::Null);
        }
    }

    let body = serde_json::to_string(&tree)?;
    if body.len() > config.max_body_size() {
        return Err(Error::document_too_large(body.len(), config.max_body_size()));
    }

    Ok(EncodedRow { body, columns })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Quoted select list: reserved columns then projections
pub(crate) fn select_list(config: &StoreConfig, dialect: &dyn Dialect) -> String {
    [SEQ_ID_COLUMN, ID_COLUMN, REVISION_COLUMN, BODY_COLUMN]
        .into_iter()
        .chain(config.columns().iter().map(|c| c.name.as_str()))
        .map(|c| dialect.quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column<'r>(row: &'r Row, name: &str) -> Result<&'r SqlValue> {
    row.get(name)
        .ok_or_else(|| Error::storage(format!("result row has no '{}' column", name)))
}

/// Sequence id of a fetched row
pub(crate) fn row_seq_id(row: &Row) -> Result<i64> {
    column(row, SEQ_ID_COLUMN)?
        .as_i64()
        .ok_or_else(|| Error::storage("seq_id column is not an integer"))
}

/// Revision of a fetched row
pub(crate) fn row_revision(row: &Row) -> Result<u64> {
    column(row, REVISION_COLUMN)?
        .as_i64()
        .and_then(|r| u64::try_from(r).ok())
        .ok_or_else(|| Error::storage("revision column is not a non-negative integer"))
}

/// Raw body text of a fetched row
pub(crate) fn row_body(row: &Row) -> Result<&str> {
    column(row, BODY_COLUMN)?
        .as_text()
        .ok_or_else(|| Error::storage("body column is not UTF-8 text"))
}

/// Id of a fetched row in display form (text, or hex for binary ids)
pub(crate) fn row_id(config: &StoreConfig, row: &Row) -> Result<String> {
    let value = column(row, ID_COLUMN)?;
    let shown = match config.id_encoding() {
        IdEncoding::Text => value.as_text().map(str::to_string),
        IdEncoding::Binary => value.as_bytes().map(hex::encode),
    };
    shown.ok_or_else(|| Error::storage("id column has an unexpected type"))
}

/// Rebuild the full document tree from a fetched row
pub(crate) fn decode_row(config: &StoreConfig, row: &Row) -> Result<Value> {
    let mut tree: Value = serde_json::from_str(row_body(row)?)
        .map_err(|e| Error::storage(format!("stored body is not valid JSON: {}", e)))?;

    for projection in config.columns() {
        let stored = row.get(&projection.name).unwrap_or(&SqlValue::Null);
        projection.restore_into(&mut tree, stored);
    }

    if let Some(path) = config.id_path() {
        set_at_path(&mut tree, path, Value::String(row_id(config, row)?));
    }
    if let Some(path) = config.revision_path() {
        set_at_path(&mut tree, path, Value::from(row_revision(row)?));
    }
    if let Some(path) = config.seq_id_path() {
        set_at_path(&mut tree, path, Value::from(row_seq_id(row)?));
    }

    Ok(tree)
}
