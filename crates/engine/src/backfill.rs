//! Column backfill
//!
//! After projections are added or changed, existing rows hold stale column
//! values (or NULL) and bodies that predate `LoadFallback` / `Extract`
//! policies. [`TableStore::update_columns`] rewrites every row from its
//! decoded document, one transaction per page of rows.
//!
//! Each row write is guarded by the revision read in the same page, so a row
//! changed by a concurrent save is skipped rather than overwritten. The
//! revision itself is left alone: the document did not change.

use docstore_core::{Document, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::{Connection, Row, SqlValue, Statement};
use crate::codec::{decode_row, encode_tree, row_id, row_revision, row_seq_id};
use crate::projection::{ID_COLUMN, SEQ_ID_COLUMN};
use crate::save::PendingWrite;
use crate::store::TableStore;

/// Outcome of [`TableStore::update_columns`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Rows read
    pub scanned: u64,
    /// Rows rewritten
    pub updated: u64,
    /// Rows whose revision changed between read and write
    pub skipped: u64,
}

impl<D: Document, C: Connection> TableStore<D, C> {
    /// Recompute projections and bodies for every row
    ///
    /// `batch_size` rows are read and rewritten per transaction. A failing
    /// page is rolled back and its error returned; earlier pages stay
    /// committed.
    pub fn update_columns(&self, batch_size: usize) -> Result<BackfillReport> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig(
                "backfill batch size must be at least 1".into(),
            ));
        }

        let dialect = self.conn.dialect();
        let seq = self.quote(SEQ_ID_COLUMN);
        let mut report = BackfillReport::default();
        let mut last_seq: Option<i64> = None;

        loop {
            let mut sql = format!("SELECT {} FROM {}", self.select, self.table);
            let mut params = Vec::new();
            if let Some(last) = last_seq {
                sql.push_str(&format!(" WHERE {} > ?", seq));
                params.push(SqlValue::Integer(last));
            }
            sql.push_str(&format!(
                " ORDER BY {} ASC {}",
                seq,
                dialect.limit(0, batch_size as u64)
            ));

            let page: Vec<Row> = self
                .query(&Statement::with_params(sql, params))?
                .iterate()
                .collect();
            let Some(last) = page.last() else {
                break;
            };
            last_seq = Some(row_seq_id(last)?);

            self.command(&Statement::new(dialect.begin_transaction()))?;
            if let Err(e) = self.backfill_page(&page, &mut report) {
                if let Err(rollback) = self.command(&Statement::new(dialect.rollback())) {
                    warn!(
                        target: "docstore::backfill",
                        table = %self.config.table(),
                        error = %rollback,
                        "rollback failed"
                    );
                }
                return Err(e);
            }
            self.command(&Statement::new(dialect.commit()))?;

            info!(
                target: "docstore::backfill",
                table = %self.config.table(),
                scanned = report.scanned,
                updated = report.updated,
                skipped = report.skipped,
                "backfill batch committed"
            );

            if page.len() < batch_size {
                break;
            }
        }

        Ok(report)
    }

    fn backfill_page(&self, page: &[Row], report: &mut BackfillReport) -> Result<()> {
        for row in page {
            report.scanned += 1;

            let revision = row_revision(row)?;
            let write = PendingWrite {
                id: row
                    .get(ID_COLUMN)
                    .cloned()
                    .ok_or_else(|| Error::storage("result row has no 'id' column"))?,
                shown_id: row_id(&self.config, row)?,
                row: encode_tree(&self.config, decode_row(&self.config, row)?)?,
            };

            let statement = self.update_statement(&write.id, &write.row, Some(revision), false);
            let result = self
                .command(&statement)
                .map_err(|e| self.write_error(e, &write))?;

            if result.affected_rows == 0 {
                report.skipped += 1;
                warn!(
                    target: "docstore::backfill",
                    table = %self.config.table(),
                    id = %write.shown_id,
                    revision,
                    "row changed during backfill, skipped"
                );
            } else {
                report.updated += 1;
            }
        }
        Ok(())
    }
}
