//! The document store contract
//!
//! Implemented by the relational [`TableStore`](crate::TableStore) and the
//! in-memory [`MemoryStore`](crate::MemoryStore), so collection semantics can
//! be checked against both with the same code.

use docstore_core::{Criteria, DocId, Document, OrderDef, Result};

use crate::backend::Connection;
use crate::save::SaveOptions;
use crate::store::TableStore;

/// Lazy sequence of documents; the first error ends it
pub type DocumentStream<'a, D> = Box<dyn Iterator<Item = Result<D>> + 'a>;

/// Keyed document collection
pub trait DocumentStore<D> {
    /// Fetch one document
    fn get_item(&self, id: &DocId) -> Result<Option<D>>;

    /// Fetch many documents; absent ids are skipped, order is unspecified
    fn get_items<'a>(&'a self, ids: &[DocId]) -> DocumentStream<'a, D>;

    /// Save a document
    fn save_item(&self, id: &DocId, document: &D, options: SaveOptions) -> Result<()>;

    /// Delete a document; absent ids are not an error
    fn remove_item(&self, id: &DocId) -> Result<()>;

    /// Delete every match; returns how many were removed
    fn remove_by_criteria(&self, criteria: &Criteria) -> Result<u64>;

    /// Delete everything
    fn clear(&self) -> Result<()>;

    /// Every document in `order`, at most `limit`
    fn list_all<'a>(&'a self, order: &OrderDef, limit: Option<u64>) -> DocumentStream<'a, D>;

    /// Matching documents in `order`, at most `limit`
    fn list_by_criteria<'a>(
        &'a self,
        criteria: &Criteria,
        order: &OrderDef,
        limit: Option<u64>,
    ) -> DocumentStream<'a, D>;
}

impl<D: Document, C: Connection> DocumentStore<D> for TableStore<D, C> {
    fn get_item(&self, id: &DocId) -> Result<Option<D>> {
        TableStore::get_item(self, id)
    }

    fn get_items<'a>(&'a self, ids: &[DocId]) -> DocumentStream<'a, D> {
        Box::new(TableStore::get_items(self, ids))
    }

    fn save_item(&self, id: &DocId, document: &D, options: SaveOptions) -> Result<()> {
        TableStore::save_item(self, id, document, options)
    }

    fn remove_item(&self, id: &DocId) -> Result<()> {
        TableStore::remove_item(self, id)
    }

    fn remove_by_criteria(&self, criteria: &Criteria) -> Result<u64> {
        TableStore::remove_by_criteria(self, criteria)
    }

    fn clear(&self) -> Result<()> {
        TableStore::clear(self)
    }

    fn list_all<'a>(&'a self, order: &OrderDef, limit: Option<u64>) -> DocumentStream<'a, D> {
        Box::new(TableStore::list_all(self, order, limit))
    }

    fn list_by_criteria<'a>(
        &'a self,
        criteria: &Criteria,
        order: &OrderDef,
        limit: Option<u64>,
    ) -> DocumentStream<'a, D> {
        Box::new(TableStore::list_by_criteria(self, criteria, order, limit))
    }
}
