//! Revisioned save protocol
//!
//! | Expected revision | Unique projections | Statement |
//! |-------------------|--------------------|-----------|
//! | none | none | atomic upsert, revision + 1 on collision |
//! | none | some | insert; on id collision, update with revision + 1 |
//! | 0 | - | insert (create) |
//! | N | - | `UPDATE ... WHERE id = ? AND revision = N` |
//!
//! The insert-then-update path is not atomic against concurrent writers: a
//! row deleted between the failed insert and the update sends us round the
//! loop again, bounded by [`MAX_WRITE_ATTEMPTS`].
//!
//! With idempotency requested, a create that collides, or an update that
//! matches no row, re-reads the stored row. If it already holds exactly the
//! attempted body and projection columns at the revision the write would
//! have produced, the write is a replay and succeeds.

use docstore_core::{DocId, Document, Error, Result};
use tracing::{debug, warn};

use crate::backend::{BackendError, Connection, ErrorClass, SqlValue, Statement};
use crate::codec::{encode_tree, id_display, id_value, EncodedRow};
use crate::projection::{TableLayout, BODY_COLUMN, ID_COLUMN, REVISION_COLUMN};
use crate::store::TableStore;

/// Attempts of the insert-then-update path before giving up
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// How [`TableStore::save_item`] treats existing rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveOptions {
    /// `None`: upsert. `Some(0)`: create. `Some(n)`: update from revision `n`.
    pub expected_revision: Option<u64>,
    /// Treat an exact repeat of an already applied write as success
    pub idempotent: bool,
}

impl SaveOptions {
    /// Insert or overwrite, whatever is stored
    pub fn upsert() -> Self {
        Self::default()
    }

    /// Insert; fail if the id exists
    pub fn create() -> Self {
        SaveOptions {
            expected_revision: Some(0),
            idempotent: false,
        }
    }

    /// Update only if the stored revision is `revision`
    pub fn update(revision: u64) -> Self {
        SaveOptions {
            expected_revision: Some(revision),
            idempotent: false,
        }
    }

    /// Accept idempotent replays
    pub fn with_idempotency(mut self) -> Self {
        self.idempotent = true;
        self
    }
}

/// A write ready to be issued
pub(crate) struct PendingWrite {
    pub id: SqlValue,
    pub shown_id: String,
    pub row: EncodedRow,
}

/// What went wrong with a write statement
enum WriteFailure {
    DuplicateId,
    Duplicate { key: String, value: String },
    Backend(BackendError),
}

impl<D: Document, C: Connection> TableStore<D, C> {
    /// Save `document` under `id`
    ///
    /// # Errors
    ///
    /// - [`Error::ItemAlreadyExists`]: create collided with a stored id
    /// - [`Error::UnexpectedRevision`]: update found another revision, or
    ///   no row (`actual: None`)
    /// - [`Error::UniqueConstraintViolation`]: a unique projection rejected
    ///   the write
    /// - [`Error::InvalidDataType`]: the document is not a JSON object, or
    ///   the id does not fit the id encoding
    /// - [`Error::Storage`]: backend failure, or the body is over the size
    ///   limit (nothing is written)
    pub fn save_item(&self, id: &DocId, document: &D, options: SaveOptions) -> Result<()> {
        let write = PendingWrite {
            id: id_value(&self.config, id)?,
            shown_id: id_display(&self.config, id),
            row: encode_tree(&self.config, document.to_tree()?)?,
        };

        match options.expected_revision {
            None if self.config.has_unique_columns() => self.insert_or_update(&write),
            None => self.upsert(&write),
            Some(0) => self.create(&write, options.idempotent),
            Some(expected) => self.update(&write, expected, options.idempotent),
        }
    }

    /// Shorthand for `save_item(id, document, SaveOptions::upsert())`
    pub fn save(&self, id: &DocId, document: &D) -> Result<()> {
        self.save_item(id, document, SaveOptions::upsert())
    }

    fn projection_names(&self) -> impl Iterator<Item = &str> {
        self.config.columns().iter().map(|c| c.name.as_str())
    }

    fn insert_statement(&self, write: &PendingWrite) -> Statement {
        let mut columns = vec![ID_COLUMN, BODY_COLUMN];
        columns.extend(self.projection_names());
        columns.push(REVISION_COLUMN);
        Statement::with_params(
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                columns
                    .iter()
                    .map(|c| self.quote(c))
                    .collect::<Vec<_>>()
                    .join(", "),
                vec!["?"; columns.len()].join(", ")
            ),
            self.row_params(write),
        )
    }

    fn upsert_statement(&self, write: &PendingWrite) -> Statement {
        let mut columns = vec![ID_COLUMN, BODY_COLUMN];
        columns.extend(self.projection_names());
        columns.push(REVISION_COLUMN);
        let mut updated = vec![BODY_COLUMN];
        updated.extend(self.projection_names());
        Statement::with_params(
            self.conn.dialect().upsert(
                self.config.table(),
                &columns,
                ID_COLUMN,
                &updated,
                REVISION_COLUMN,
            ),
            self.row_params(write),
        )
    }

    /// `id, body, projections.., revision = 1` in insert order
    fn row_params(&self, write: &PendingWrite) -> Vec<SqlValue> {
        let mut params = vec![write.id.clone(), SqlValue::Text(write.row.body.clone())];
        params.extend(write.row.columns.iter().cloned());
        params.push(SqlValue::Integer(1));
        params
    }

    /// `UPDATE` of body and projections, optionally guarded by revision
    pub(crate) fn update_statement(
        &self,
        id: &SqlValue,
        row: &EncodedRow,
        expected: Option<u64>,
        bump_revision: bool,
    ) -> Statement {
        let mut assignments = vec![format!("{} = ?", self.quote(BODY_COLUMN))];
        assignments.extend(self.projection_names().map(|c| format!("{} = ?", self.quote(c))));
        if bump_revision {
            let rev = self.quote(REVISION_COLUMN);
            assignments.push(format!("{} = {} + 1", rev, rev));
        }

        let mut sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table,
            assignments.join(", "),
            self.quote(ID_COLUMN)
        );
        let mut params = vec![SqlValue::Text(row.body.clone())];
        params.extend(row.columns.iter().cloned());
        params.push(id.clone());
        if let Some(expected) = expected {
            sql.push_str(&format!(" AND {} = ?", self.quote(REVISION_COLUMN)));
            params.push(SqlValue::Integer(expected as i64));
        }
        Statement::with_params(sql, params)
    }

    fn upsert(&self, write: &PendingWrite) -> Result<()> {
        self.command(&self.upsert_statement(write))
            .map_err(|e| self.write_error(e, write))?;
        Ok(())
    }

    fn insert_or_update(&self, write: &PendingWrite) -> Result<()> {
        let insert = self.insert_statement(write);
        let update = self.update_statement(&write.id, &write.row, None, true);

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let err = match self.command(&insert) {
                Ok(_) => return Ok(()),
                Err(e) => e,
            };
            match self.classify(err, write) {
                WriteFailure::DuplicateId => {
                    warn!(
                        target: "docstore::save",
                        table = %self.config.table(),
                        id = %write.shown_id,
                        attempt,
                        "id collision on insert, falling back to update"
                    );
                    let result = self
                        .command(&update)
                        .map_err(|e| self.write_error(e, write))?;
                    if result.affected_rows > 0 {
                        return Ok(());
                    }
                }
                failure => return Err(self.failure_error(failure, write)),
            }
        }

        Err(Error::storage(format!(
            "save of {} did not settle after {} attempts",
            write.shown_id, MAX_WRITE_ATTEMPTS
        )))
    }

    fn create(&self, write: &PendingWrite, idempotent: bool) -> Result<()> {
        let err = match self.command(&self.insert_statement(write)) {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };
        match self.classify(err, write) {
            WriteFailure::DuplicateId => {
                if idempotent && self.is_replay(write, 1)? {
                    debug!(target: "docstore::save", id = %write.shown_id, "idempotent create replay");
                    return Ok(());
                }
                Err(Error::ItemAlreadyExists {
                    id: write.shown_id.clone(),
                })
            }
            failure => Err(self.failure_error(failure, write)),
        }
    }

    fn update(&self, write: &PendingWrite, expected: u64, idempotent: bool) -> Result<()> {
        let statement = self.update_statement(&write.id, &write.row, Some(expected), true);
        let result = self
            .command(&statement)
            .map_err(|e| self.write_error(e, write))?;
        if result.affected_rows > 0 {
            return Ok(());
        }

        match self.stored_state_for(&write.id)? {
            None => Err(Error::UnexpectedRevision {
                id: write.shown_id.clone(),
                expected,
                actual: None,
            }),
            Some(state) => {
                let replayed = state.holds(&self.config, &write.row, expected.saturating_add(1));
                if idempotent && replayed {
                    debug!(target: "docstore::save", id = %write.shown_id, "idempotent update replay");
                    return Ok(());
                }
                Err(Error::UnexpectedRevision {
                    id: write.shown_id.clone(),
                    expected,
                    actual: Some(state.revision),
                })
            }
        }
    }

    /// True if the stored row already is this write at `revision`
    fn is_replay(&self, write: &PendingWrite, revision: u64) -> Result<bool> {
        Ok(self
            .stored_state_for(&write.id)?
            .is_some_and(|state| state.holds(&self.config, &write.row, revision)))
    }

    /// Map a backend error from a write to a [`WriteFailure`]
    fn classify(&self, err: BackendError, write: &PendingWrite) -> WriteFailure {
        let (key, value) = match self.conn.classify_error(&err) {
            ErrorClass::Other => return WriteFailure::Backend(err),
            ErrorClass::Duplicate { key, value } => (key, value),
        };

        let table = self.config.table();
        let bare = key.rsplit('.').next().unwrap_or(&key);
        let names = |column: &str| bare == column || bare == TableLayout::index_name(table, column);

        if names(ID_COLUMN) {
            return WriteFailure::DuplicateId;
        }
        if let Some(i) = self.config.columns().iter().position(|c| names(c.name.as_str())) {
            let column = &self.config.columns()[i];
            return WriteFailure::Duplicate {
                key: column.name.clone(),
                value: value.unwrap_or_else(|| write.row.columns[i].to_string()),
            };
        }
        if !self.config.has_unique_columns() {
            return WriteFailure::DuplicateId;
        }
        WriteFailure::Duplicate {
            key: bare.to_string(),
            value: value.unwrap_or_default(),
        }
    }

    fn failure_error(&self, failure: WriteFailure, write: &PendingWrite) -> Error {
        match failure {
            WriteFailure::DuplicateId => Error::ItemAlreadyExists {
                id: write.shown_id.clone(),
            },
            WriteFailure::Duplicate { key, value } => {
                Error::UniqueConstraintViolation { key, value }
            }
            WriteFailure::Backend(e) => e.into(),
        }
    }

    pub(crate) fn write_error(&self, err: BackendError, write: &PendingWrite) -> Error {
        let failure = self.classify(err, write);
        self.failure_error(failure, write)
    }
}
