//! In-memory reference store
//!
//! A map from id to document tree with no revisions and no batching. It
//! exists to pin down collection semantics: the same contract tests run
//! against it and against [`TableStore`](crate::TableStore).
//!
//! Save options are ignored; every save overwrites. Insertion order is kept
//! as a sequence number so `_seq` and the default order behave like the
//! relational store.

use docstore_core::{
    compare_values, get_at_path, Criteria, DocId, Document, Error, JsonPath, OrderDef, Result,
    ID_FIELD, SEQ_ID_FIELD,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::marker::PhantomData;

use crate::save::SaveOptions;
use crate::traits::{DocumentStore, DocumentStream};

struct StoredItem {
    seq: u64,
    tree: Value,
}

#[derive(Default)]
struct Items {
    next_seq: u64,
    by_id: HashMap<DocId, StoredItem>,
}

/// Unbatched, unrevisioned document store held in memory
pub struct MemoryStore<D> {
    items: RwLock<Items>,
    _marker: PhantomData<fn() -> D>,
}

impl<D> Default for MemoryStore<D> {
    fn default() -> Self {
        MemoryStore {
            items: RwLock::new(Items::default()),
            _marker: PhantomData,
        }
    }
}

impl<D: Document> MemoryStore<D> {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.items.read().by_id.len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Trees of matching items in `order`, at most `limit`
    fn select(&self, criteria: &Criteria, order: &OrderDef, limit: Option<u64>) -> Vec<Value> {
        let items = self.items.read();
        let mut selected: Vec<(&DocId, &StoredItem)> = items
            .by_id
            .iter()
            .filter(|(id, item)| criteria.evaluate(&|f: &str| lookup(id, item, f)) == Some(true))
            .collect();

        selected.sort_by(|(a_id, a), (b_id, b)| {
            for key in order.fields() {
                let ordering = order_values(
                    lookup(a_id, a, &key.field).as_ref(),
                    lookup(b_id, b, &key.field).as_ref(),
                );
                let ordering = if key.ascending {
                    ordering
                } else {
                    ordering.reverse()
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.seq.cmp(&b.seq)
        });

        let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        selected
            .into_iter()
            .take(limit)
            .map(|(_, item)| item.tree.clone())
            .collect()
    }
}

/// Value of a logical field for one stored item
fn lookup(id: &DocId, item: &StoredItem, field: &str) -> Option<Value> {
    match field {
        ID_FIELD => Some(Value::String(
            id.as_str().map(str::to_string).unwrap_or_else(|| id.to_hex()),
        )),
        SEQ_ID_FIELD => Some(Value::from(item.seq)),
        _ => {
            let path = field
                .parse::<JsonPath>()
                .unwrap_or_else(|_| JsonPath::root().key(field));
            get_at_path(&item.tree, &path).cloned()
        }
    }
}

/// Sort order for possibly missing values: missing and null first
fn order_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            compare_values(a, b).unwrap_or_else(|| kind_rank(a).cmp(&kind_rank(b)))
        }
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) | Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) | Value::Object(_) => 3,
    }
}

fn decode_all<'a, D: Document + 'a>(trees: Vec<Value>) -> DocumentStream<'a, D> {
    Box::new(trees.into_iter().map(D::from_tree))
}

impl<D: Document> DocumentStore<D> for MemoryStore<D> {
    fn get_item(&self, id: &DocId) -> Result<Option<D>> {
        let tree = self.items.read().by_id.get(id).map(|item| item.tree.clone());
        tree.map(D::from_tree).transpose()
    }

    fn get_items<'a>(&'a self, ids: &[DocId]) -> DocumentStream<'a, D> {
        let items = self.items.read();
        let trees = ids
            .iter()
            .filter_map(|id| items.by_id.get(id).map(|item| item.tree.clone()))
            .collect();
        decode_all(trees)
    }

    fn save_item(&self, id: &DocId, document: &D, _options: SaveOptions) -> Result<()> {
        let tree = document.to_tree()?;
        if !tree.is_object() {
            return Err(Error::InvalidDataType(
                "document must serialize to a JSON object".into(),
            ));
        }
        let mut items = self.items.write();
        if let Some(existing) = items.by_id.get_mut(id) {
            existing.tree = tree;
            return Ok(());
        }
        items.next_seq += 1;
        let seq = items.next_seq;
        items.by_id.insert(id.clone(), StoredItem { seq, tree });
        Ok(())
    }

    fn remove_item(&self, id: &DocId) -> Result<()> {
        self.items.write().by_id.remove(id);
        Ok(())
    }

    fn remove_by_criteria(&self, criteria: &Criteria) -> Result<u64> {
        let mut items = self.items.write();
        let before = items.by_id.len();
        items.by_id.retain(|id, item| {
            let item = &*item;
            criteria.evaluate(&|f: &str| lookup(id, item, f)) != Some(true)
        });
        Ok((before - items.by_id.len()) as u64)
    }

    fn clear(&self) -> Result<()> {
        self.items.write().by_id.clear();
        Ok(())
    }

    fn list_all<'a>(&'a self, order: &OrderDef, limit: Option<u64>) -> DocumentStream<'a, D> {
        decode_all(self.select(&Criteria::all(), order, limit))
    }

    fn list_by_criteria<'a>(
        &'a self,
        criteria: &Criteria,
        order: &OrderDef,
        limit: Option<u64>,
    ) -> DocumentStream<'a, D> {
        decode_all(self.select(criteria, order, limit))
    }
}
