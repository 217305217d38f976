//! The document capability
//!
//! A store is typed over its document: anything that converts to and from a
//! JSON tree can be stored. The blanket implementation covers every serde
//! type, so `#[derive(Serialize, Deserialize)]` is all a caller writes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Conversion between a stored value and its JSON tree
pub trait Document: Sized {
    /// Serialize to a JSON tree
    fn to_tree(&self) -> Result<Value>;

    /// Rebuild from a JSON tree
    fn from_tree(tree: Value) -> Result<Self>;
}

impl<T> Document for T
where
    T: Serialize + DeserializeOwned,
{
    fn to_tree(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn from_tree(tree: Value) -> Result<Self> {
        serde_json::from_value(tree).map_err(|e| Error::Serialization(e.to_string()))
    }
}
