//! Relational document store
//!
//! `TableStore` is the façade: it owns the configuration, the compiled
//! fragment cache and a handle to the connection, and composes the codec,
//! the criteria compiler, the save protocol (`save.rs`), batched iteration
//! (`iterate.rs`) and the backfill (`backfill.rs`).
//!
//! Nothing is cached besides field resolutions; every call goes to the
//! backend.

use docstore_core::{Criteria, DocId, Document, Error, OrderDef, Result};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

use crate::backend::{BackendError, CommandResult, Connection, QueryResult, SqlValue, Statement};
use crate::codec::{self, decode_row, id_value, EncodedRow};
use crate::compiler::{CriteriaCompiler, SqlFragment};
use crate::config::StoreConfig;
use crate::iterate::{DocumentCursor, IdBatches};
use crate::projection::{TableLayout, BODY_COLUMN, ID_COLUMN, REVISION_COLUMN};

/// Revision, body text and projection columns of a stored row
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoredState {
    pub revision: u64,
    pub body: String,
    pub columns: Vec<SqlValue>,
}

impl StoredState {
    /// True if this row is exactly `row` written at `revision`
    ///
    /// Columns compare as the body values they decode to.
    pub fn holds(&self, config: &StoreConfig, row: &EncodedRow, revision: u64) -> bool {
        self.revision == revision
            && self.body == row.body
            && self.columns.len() == row.columns.len()
            && config
                .columns()
                .iter()
                .zip(self.columns.iter().zip(&row.columns))
                .all(|(c, (stored, written))| {
                    c.column_type.decode(stored) == c.column_type.decode(written)
                })
    }
}

/// Document store backed by one relational table
///
/// # Example
///
/// ```ignore
/// let conn = Arc::new(SqliteConnection::open_in_memory()?);
/// let config = StoreConfig::builder("users").id_path("id").build()?;
/// conn.create_table(&config.table_layout())?;
///
/// let users: TableStore<User, _> = TableStore::new(conn, config);
/// users.save_item(&"u1".into(), &user, SaveOptions::create())?;
/// ```
pub struct TableStore<D, C> {
    pub(crate) conn: Arc<C>,
    pub(crate) config: Arc<StoreConfig>,
    pub(crate) compiler: CriteriaCompiler<C>,
    pub(crate) select: String,
    pub(crate) table: String,
    _marker: PhantomData<fn() -> D>,
}

impl<D: Document, C: Connection> TableStore<D, C> {
    /// Create a store over `conn` for `config`
    pub fn new(conn: Arc<C>, config: StoreConfig) -> Self {
        let config = Arc::new(config);
        let dialect = conn.dialect();
        let select = codec::select_list(&config, dialect);
        let table = dialect.quote_ident(config.table());
        let compiler = CriteriaCompiler::new(conn.clone(), config.clone());
        TableStore {
            conn,
            config,
            compiler,
            select,
            table,
            _marker: PhantomData,
        }
    }

    /// Store configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Underlying connection
    pub fn connection(&self) -> &Arc<C> {
        &self.conn
    }

    /// Columns and indexes this store expects
    pub fn table_layout(&self) -> TableLayout {
        self.config.table_layout()
    }

    pub(crate) fn quote(&self, ident: &str) -> String {
        self.conn.dialect().quote_ident(ident)
    }

    pub(crate) fn query(
        &self,
        statement: &Statement,
    ) -> std::result::Result<QueryResult, BackendError> {
        debug!(
            target: "docstore::sql",
            table = %self.config.table(),
            sql = %statement.sql,
            params = statement.params.len(),
            "query"
        );
        self.conn.query(statement)
    }

    pub(crate) fn command(
        &self,
        statement: &Statement,
    ) -> std::result::Result<CommandResult, BackendError> {
        debug!(
            target: "docstore::sql",
            table = %self.config.table(),
            sql = %statement.sql,
            params = statement.params.len(),
            "command"
        );
        self.conn.command(statement)
    }

    /// `<id column> = ?` with the id bound
    fn by_id(&self, id: &DocId) -> Result<SqlFragment> {
        Ok(SqlFragment {
            sql: format!("{} = ?", self.quote(ID_COLUMN)),
            params: vec![id_value(&self.config, id)?],
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch one document; `None` if the id is absent
    pub fn get_item(&self, id: &DocId) -> Result<Option<D>> {
        let filter = self.by_id(id)?;
        let statement = Statement::with_params(
            format!("SELECT {} FROM {} WHERE {}", self.select, self.table, filter.sql),
            filter.params,
        );
        match self.query(&statement)?.fetch_one() {
            Some(row) => Ok(Some(D::from_tree(decode_row(&self.config, &row)?)?)),
            None => Ok(None),
        }
    }

    /// Fetch many documents, one query per `id_batch_size` ids
    ///
    /// Absent ids are skipped. Results follow the backend's row order, not
    /// the order of `ids`.
    pub fn get_items(&self, ids: &[DocId]) -> IdBatches<'_, D, C> {
        IdBatches::new(self, ids.to_vec())
    }

    pub(crate) fn fetch_ids(&self, ids: &[DocId]) -> Result<Vec<D>> {
        let params = ids
            .iter()
            .map(|id| id_value(&self.config, id))
            .collect::<Result<Vec<SqlValue>>>()?;
        let placeholders = vec!["?"; params.len()].join(", ");
        let statement = Statement::with_params(
            format!(
                "SELECT {} FROM {} WHERE {} IN ({})",
                self.select,
                self.table,
                self.quote(ID_COLUMN),
                placeholders
            ),
            params,
        );
        self.query(&statement)?
            .iterate()
            .map(|row| D::from_tree(decode_row(&self.config, &row)?))
            .collect()
    }

    /// Current revision of `id`, `None` if absent
    pub fn get_revision(&self, id: &DocId) -> Result<Option<u64>> {
        Ok(self.stored_state(id)?.map(|state| state.revision))
    }

    /// True if `id` is stored
    pub fn exists(&self, id: &DocId) -> Result<bool> {
        Ok(self.get_revision(id)?.is_some())
    }

    /// Raw stored state of `id`
    pub(crate) fn stored_state(&self, id: &DocId) -> Result<Option<StoredState>> {
        self.stored_state_for(&id_value(&self.config, id)?)
    }

    /// Raw stored state of the row whose id column holds `id`
    pub(crate) fn stored_state_for(&self, id: &SqlValue) -> Result<Option<StoredState>> {
        let mut selected = vec![self.quote(REVISION_COLUMN), self.quote(BODY_COLUMN)];
        selected.extend(self.config.columns().iter().map(|c| self.quote(&c.name)));
        let statement = Statement::with_params(
            format!(
                "SELECT {} FROM {} WHERE {} = ?",
                selected.join(", "),
                self.table,
                self.quote(ID_COLUMN)
            ),
            vec![id.clone()],
        );
        let Some(row) = self.query(&statement)?.fetch_one() else {
            return Ok(None);
        };
        let columns = self
            .config
            .columns()
            .iter()
            .map(|c| row.get(&c.name).cloned().unwrap_or(SqlValue::Null))
            .collect();
        Ok(Some(StoredState {
            revision: codec::row_revision(&row)?,
            body: codec::row_body(&row)?.to_string(),
            columns,
        }))
    }

    /// Number of documents matching `criteria`
    pub fn count(&self, criteria: &Criteria) -> Result<u64> {
        let filter = self.compiler.compile(criteria);
        let statement = Statement::with_params(
            format!("SELECT COUNT(*) AS n FROM {} WHERE {}", self.table, filter.sql),
            filter.params,
        );
        let n = self
            .query(&statement)?
            .fetch_one()
            .and_then(|row| row.get("n").and_then(SqlValue::as_i64))
            .ok_or_else(|| Error::storage("COUNT(*) returned no integer"))?;
        u64::try_from(n).map_err(|_| Error::storage(format!("COUNT(*) returned {}", n)))
    }

    /// Every document, in `order`, at most `limit`
    pub fn list_all(&self, order: &OrderDef, limit: Option<u64>) -> DocumentCursor<'_, D, C> {
        self.list_by_criteria(&Criteria::all(), order, limit)
    }

    /// Documents matching `criteria`, in `order`, at most `limit`
    ///
    /// The sequence is lazy: one page is fetched at a time, and dropping the
    /// cursor stops further queries.
    pub fn list_by_criteria(
        &self,
        criteria: &Criteria,
        order: &OrderDef,
        limit: Option<u64>,
    ) -> DocumentCursor<'_, D, C> {
        DocumentCursor::new(self, self.compiler.compile(criteria), order, limit)
    }

    // =========================================================================
    // Deletes
    // =========================================================================

    /// Delete `id`; absent ids are not an error
    pub fn remove_item(&self, id: &DocId) -> Result<()> {
        let filter = self.by_id(id)?;
        let statement = Statement::with_params(
            format!("DELETE FROM {} WHERE {}", self.table, filter.sql),
            filter.params,
        );
        self.command(&statement)?;
        Ok(())
    }

    /// Delete every document matching `criteria`; returns the number removed
    pub fn remove_by_criteria(&self, criteria: &Criteria) -> Result<u64> {
        let filter = self.compiler.compile(criteria);
        let statement = Statement::with_params(
            format!("DELETE FROM {} WHERE {}", self.table, filter.sql),
            filter.params,
        );
        Ok(self.command(&statement)?.affected_rows)
    }

    /// Delete every document
    pub fn clear(&self) -> Result<()> {
        self.command(&Statement::new(format!("DELETE FROM {}", self.table)))?;
        Ok(())
    }
}
