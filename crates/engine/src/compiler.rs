//! Criteria predicate compiler
//!
//! Turns a [`Criteria`] tree into a SQL fragment plus bound parameters.
//! Every logical field name resolves to exactly one target:
//!
//! | Field | Target |
//! |-------|--------|
//! | `_id` or the configured id path | id column (hex-decoded for binary ids) |
//! | `_seq` or the configured sequence id path | `seq_id` column |
//! | `_rev` or the configured revision path | `revision` column |
//! | a projection's path | that projection's column |
//! | anything else | JSON extraction from the body |
//!
//! Resolution never fails: unknown fields are body fields. Resolved field
//! expressions are memoized per field name.

use dashmap::DashMap;
use docstore_core::{Criteria, JsonPath, OrderDef, ID_FIELD, REVISION_FIELD, SEQ_ID_FIELD};
use serde_json::Value;
use std::sync::Arc;

use crate::backend::{Connection, SqlValue};
use crate::config::{IdEncoding, StoreConfig};
use crate::projection::{BODY_COLUMN, ID_COLUMN, REVISION_COLUMN, SEQ_ID_COLUMN};

/// Compiled predicate
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    /// SQL text with `?` placeholders
    pub sql: String,
    /// Bound values, in placeholder order
    pub params: Vec<SqlValue>,
}

impl SqlFragment {
    /// Fragment without parameters
    pub fn new(sql: impl Into<String>) -> Self {
        SqlFragment {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Always-true predicate
    pub fn always() -> Self {
        SqlFragment::new("1 = 1")
    }

    /// Always-false predicate
    pub fn never() -> Self {
        SqlFragment::new("1 = 0")
    }
}

/// Where a logical field lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTarget {
    /// Id column
    Id,
    /// Sequence id column
    SeqId,
    /// Revision column
    Revision,
    /// Projection column, by index into the configured columns
    Column(usize),
    /// JSON path inside the body
    Body(JsonPath),
}

/// A resolved field: where it lives and its SQL expression
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    /// Target
    pub target: FieldTarget,
    /// SQL expression reading the field
    pub expr: String,
}

/// Compiles criteria and order definitions against one store configuration
pub struct CriteriaCompiler<C> {
    conn: Arc<C>,
    config: Arc<StoreConfig>,
    fields: DashMap<String, Arc<ResolvedField>>,
}

impl<C: Connection> CriteriaCompiler<C> {
    /// Create a compiler for `config` speaking `conn`'s dialect
    pub fn new(conn: Arc<C>, config: Arc<StoreConfig>) -> Self {
        CriteriaCompiler {
            conn,
            config,
            fields: DashMap::new(),
        }
    }

    fn quote(&self, ident: &str) -> String {
        self.conn.dialect().quote_ident(ident)
    }

    /// Resolve a logical field name (memoized)
    pub fn resolve(&self, field: &str) -> Arc<ResolvedField> {
        if let Some(hit) = self.fields.get(field) {
            return hit.clone();
        }
        let resolved = Arc::new(self.resolve_uncached(field));
        self.fields.insert(field.to_string(), resolved.clone());
        resolved
    }

    fn resolve_uncached(&self, field: &str) -> ResolvedField {
        let path: JsonPath = field
            .parse()
            .unwrap_or_else(|_| JsonPath::root().key(field));
        let is = |configured: Option<&JsonPath>| configured == Some(&path);

        let target = if field == ID_FIELD || is(self.config.id_path()) {
            FieldTarget::Id
        } else if field == SEQ_ID_FIELD || is(self.config.seq_id_path()) {
            FieldTarget::SeqId
        } else if field == REVISION_FIELD || is(self.config.revision_path()) {
            FieldTarget::Revision
        } else if let Some(i) = self.config.columns().iter().position(|c| c.path == path) {
            FieldTarget::Column(i)
        } else {
            FieldTarget::Body(path.clone())
        };

        let expr = match &target {
            FieldTarget::Id => self.quote(ID_COLUMN),
            FieldTarget::SeqId => self.quote(SEQ_ID_COLUMN),
            FieldTarget::Revision => self.quote(REVISION_COLUMN),
            FieldTarget::Column(i) => self.quote(&self.config.columns()[*i].name),
            FieldTarget::Body(path) => {
                let dialect = self.conn.dialect();
                let literal = format!("'{}'", self.conn.escape(&dialect.json_path(path)));
                dialect.json_extract(&self.quote(BODY_COLUMN), &literal)
            }
        };

        ResolvedField { target, expr }
    }

    /// Placeholder and bound value for comparing `field` with `value`
    fn bind(&self, field: &ResolvedField, value: &Value) -> (String, SqlValue) {
        match &field.target {
            FieldTarget::Id => match (self.config.id_encoding(), value) {
                (IdEncoding::Binary, Value::String(hex)) => (
                    self.conn.dialect().decode_hex("?"),
                    SqlValue::Text(hex.clone()),
                ),
                _ => ("?".to_string(), SqlValue::from_json(value)),
            },
            FieldTarget::SeqId | FieldTarget::Revision => {
                ("?".to_string(), SqlValue::from_json(value))
            }
            FieldTarget::Column(i) => (
                "?".to_string(),
                self.config.columns()[*i].column_type.encode(value),
            ),
            FieldTarget::Body(_) => ("?".to_string(), self.conn.dialect().json_constant(value)),
        }
    }

    /// Compile a criteria tree
    pub fn compile(&self, criteria: &Criteria) -> SqlFragment {
        let mut params = Vec::new();
        let sql = self.compile_into(criteria, &mut params);
        SqlFragment { sql, params }
    }

    fn compile_into(&self, criteria: &Criteria, params: &mut Vec<SqlValue>) -> String {
        match criteria {
            Criteria::Const(true) => SqlFragment::always().sql,
            Criteria::Const(false) => SqlFragment::never().sql,
            Criteria::Compare { field, op, value } => {
                let field = self.resolve(field);
                let (placeholder, bound) = self.bind(&field, value);
                params.push(bound);
                format!("{} {} {}", field.expr, op.as_sql(), placeholder)
            }
            Criteria::IsNull(field) => format!("{} IS NULL", self.resolve(field).expr),
            Criteria::IsNotNull(field) => format!("{} IS NOT NULL", self.resolve(field).expr),
            Criteria::In { field, values } => {
                if values.is_empty() {
                    return SqlFragment::never().sql;
                }
                let field = self.resolve(field);
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| {
                        let (placeholder, bound) = self.bind(&field, v);
                        params.push(bound);
                        placeholder
                    })
                    .collect();
                format!("{} IN ({})", field.expr, placeholders.join(", "))
            }
            Criteria::And(parts) => self.join(parts, " AND ", SqlFragment::always, params),
            Criteria::Or(parts) => self.join(parts, " OR ", SqlFragment::never, params),
            Criteria::Not(inner) => format!("NOT ({})", self.compile_into(inner, params)),
        }
    }

    fn join(
        &self,
        parts: &[Criteria],
        op: &str,
        empty: fn() -> SqlFragment,
        params: &mut Vec<SqlValue>,
    ) -> String {
        if parts.is_empty() {
            return empty().sql;
        }
        parts
            .iter()
            .map(|p| format!("({})", self.compile_into(p, params)))
            .collect::<Vec<_>>()
            .join(op)
    }

    /// Resolve an order definition into `(field, ascending)` keys
    pub fn order_keys(&self, order: &OrderDef) -> Vec<(Arc<ResolvedField>, bool)> {
        order
            .fields()
            .iter()
            .map(|f| (self.resolve(&f.field), f.ascending))
            .collect()
    }

    /// Render `ORDER BY` keys (without the keyword)
    pub fn order_sql(keys: &[(Arc<ResolvedField>, bool)]) -> String {
        keys.iter()
            .map(|(f, asc)| format!("{} {}", f.expr, if *asc { "ASC" } else { "DESC" }))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Number of memoized field resolutions
    pub fn cached_fields(&self) -> usize {
        self.fields.len()
    }
}
