//! Batched iteration
//!
//! A listing is streamed page by page. The page plan depends on the order:
//!
//! - no order, or ordered purely by `_seq`: seek by sequence id
//!   (`seq_id > last` ascending, `seq_id < last` descending)
//! - any other order: offset windows, with `seq_id ASC` appended when the
//!   order has no id or sequence id key so the total order is stable
//! - batching disabled (`batch_size = 0`): one query, still ordered the same
//!   way, with the limit applied in SQL
//!
//! The final page shrinks so the number of rows yielded never exceeds the
//! limit, and a short page ends the listing. Nothing is fetched until the
//! cursor is polled; dropping it stops the listing.

use docstore_core::{DocId, Document, OrderDef, Result};
use std::sync::Arc;
use tracing::debug;

use crate::backend::{Connection, Row, SqlValue, Statement};
use crate::codec::{decode_row, row_seq_id};
use crate::compiler::{CriteriaCompiler, FieldTarget, ResolvedField, SqlFragment};
use crate::projection::SEQ_ID_COLUMN;
use crate::store::TableStore;

/// How a listing is paged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagePlan {
    /// Seek by sequence id, ascending
    SeqAscending,
    /// Seek by sequence id, descending
    SeqDescending,
    /// Offset windows over an explicit order
    Offset {
        /// Rendered `ORDER BY` keys
        order: String,
    },
    /// A single unbatched query
    Single {
        /// Rendered `ORDER BY` keys
        order: String,
    },
}

impl PagePlan {
    /// Choose a plan for `order`; `batch_size = 0` means unbatched
    pub fn choose<C: Connection>(
        compiler: &CriteriaCompiler<C>,
        order: &OrderDef,
        batch_size: usize,
    ) -> Self {
        let keys = compiler.order_keys(order);

        if batch_size > 0 {
            if keys.is_empty() {
                return PagePlan::SeqAscending;
            }
            if let [(field, ascending)] = keys.as_slice() {
                if field.target == FieldTarget::SeqId {
                    return if *ascending {
                        PagePlan::SeqAscending
                    } else {
                        PagePlan::SeqDescending
                    };
                }
            }
        }

        let order = CriteriaCompiler::<C>::order_sql(&with_tie_breaker(compiler, keys));
        if batch_size > 0 {
            PagePlan::Offset { order }
        } else {
            PagePlan::Single { order }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PagePlan::SeqAscending => "seq_asc",
            PagePlan::SeqDescending => "seq_desc",
            PagePlan::Offset { .. } => "offset",
            PagePlan::Single { .. } => "single",
        }
    }
}

/// Append `seq_id ASC` unless a key already orders by id or sequence id
fn with_tie_breaker<C: Connection>(
    compiler: &CriteriaCompiler<C>,
    mut keys: Vec<(Arc<ResolvedField>, bool)>,
) -> Vec<(Arc<ResolvedField>, bool)> {
    let has_unique_key = keys
        .iter()
        .any(|(f, _)| matches!(f.target, FieldTarget::Id | FieldTarget::SeqId));
    if !has_unique_key {
        keys.push((compiler.resolve(docstore_core::SEQ_ID_FIELD), true));
    }
    keys
}

/// Lazy listing over a [`TableStore`]
///
/// Yields `Result<D>`; the first error ends the listing.
pub struct DocumentCursor<'s, D, C> {
    store: &'s TableStore<D, C>,
    filter: SqlFragment,
    plan: PagePlan,
    batch_size: u64,
    remaining: Option<u64>,
    last_seq: Option<i64>,
    offset: u64,
    page: std::vec::IntoIter<Row>,
    exhausted: bool,
}

impl<'s, D: Document, C: Connection> DocumentCursor<'s, D, C> {
    pub(crate) fn new(
        store: &'s TableStore<D, C>,
        filter: SqlFragment,
        order: &OrderDef,
        limit: Option<u64>,
    ) -> Self {
        let batch_size = store.config.batch_size();
        DocumentCursor {
            plan: PagePlan::choose(&store.compiler, order, batch_size),
            store,
            filter,
            batch_size: batch_size as u64,
            remaining: limit,
            last_seq: None,
            offset: 0,
            page: Vec::new().into_iter(),
            exhausted: false,
        }
    }

    /// Plan this cursor pages with
    pub fn plan(&self) -> &PagePlan {
        &self.plan
    }

    /// Rows to request next; `None` means unlimited
    fn next_page_size(&self) -> Option<u64> {
        match (&self.plan, self.remaining) {
            (PagePlan::Single { .. }, remaining) => remaining,
            (_, Some(remaining)) => Some(remaining.min(self.batch_size)),
            (_, None) => Some(self.batch_size),
        }
    }

    fn page_statement(&self, page_size: Option<u64>) -> Statement {
        let store = self.store;
        let seq = store.quote(SEQ_ID_COLUMN);
        let dialect = store.conn.dialect();
        let mut sql = format!(
            "SELECT {} FROM {} WHERE ({})",
            store.select, store.table, self.filter.sql
        );
        let mut params = self.filter.params.clone();

        match &self.plan {
            PagePlan::SeqAscending | PagePlan::SeqDescending => {
                let (op, direction) = if self.plan == PagePlan::SeqAscending {
                    (">", "ASC")
                } else {
                    ("<", "DESC")
                };
                if let Some(last) = self.last_seq {
                    sql.push_str(&format!(" AND {} {} ?", seq, op));
                    params.push(SqlValue::Integer(last));
                }
                sql.push_str(&format!(" ORDER BY {} {}", seq, direction));
            }
            PagePlan::Offset { order } | PagePlan::Single { order } => {
                sql.push_str(&format!(" ORDER BY {}", order));
            }
        }

        if let Some(size) = page_size {
            let offset = match self.plan {
                PagePlan::Offset { .. } => self.offset,
                _ => 0,
            };
            sql.push(' ');
            sql.push_str(&dialect.limit(offset, size));
        }

        Statement::with_params(sql, params)
    }

    fn fetch_page(&mut self) -> Result<()> {
        let page_size = self.next_page_size();
        debug!(
            target: "docstore::iterate",
            table = %self.store.config.table(),
            strategy = self.plan.name(),
            page_size = ?page_size,
            offset = self.offset,
            "fetching page"
        );

        let rows: Vec<Row> = self.store.query(&self.page_statement(page_size))?.iterate().collect();
        let fetched = rows.len() as u64;

        if let Some(last) = rows.last() {
            self.last_seq = Some(row_seq_id(last)?);
        }
        self.offset += fetched;
        self.exhausted = match (&self.plan, page_size) {
            (PagePlan::Single { .. }, _) | (_, None) => true,
            (_, Some(size)) => fetched < size,
        };
        self.page = rows.into_iter();
        Ok(())
    }
}

impl<'s, D: Document, C: Connection> Iterator for DocumentCursor<'s, D, C> {
    type Item = Result<D>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining == Some(0) {
                return None;
            }
            if let Some(row) = self.page.next() {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                let item = decode_row(&self.store.config, &row).and_then(D::from_tree);
                if item.is_err() {
                    self.fail();
                }
                return Some(item);
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.fail();
                return Some(Err(e));
            }
        }
    }
}

impl<'s, D, C> DocumentCursor<'s, D, C> {
    fn fail(&mut self) {
        self.exhausted = true;
        self.page = Vec::new().into_iter();
    }
}

/// Lazy multi-id lookup, one query per chunk of `id_batch_size` ids
pub struct IdBatches<'s, D, C> {
    store: &'s TableStore<D, C>,
    ids: Vec<DocId>,
    next_chunk: usize,
    page: std::vec::IntoIter<D>,
    failed: bool,
}

impl<'s, D: Document, C: Connection> IdBatches<'s, D, C> {
    pub(crate) fn new(store: &'s TableStore<D, C>, ids: Vec<DocId>) -> Self {
        IdBatches {
            store,
            ids,
            next_chunk: 0,
            page: Vec::new().into_iter(),
            failed: false,
        }
    }
}

impl<'s, D: Document, C: Connection> Iterator for IdBatches<'s, D, C> {
    type Item = Result<D>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(doc) = self.page.next() {
                return Some(Ok(doc));
            }
            if self.failed || self.next_chunk >= self.ids.len() {
                return None;
            }
            let end = (self.next_chunk + self.store.config.id_batch_size()).min(self.ids.len());
            let chunk = &self.ids[self.next_chunk..end];
            self.next_chunk = end;
            match self.store.fetch_ids(chunk) {
                Ok(docs) => self.page = docs.into_iter(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
