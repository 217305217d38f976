//! Core types for docstore
//!
//! This crate defines the backend-independent vocabulary of the document
//! store:
//! - json: JsonPath and the path navigator (get / set / extract / fallback)
//! - DocId: caller-supplied byte-string identifier
//! - Criteria: boolean expression tree with a three-valued evaluator
//! - OrderDef: sort keys
//! - Document: conversion between a stored type and its JSON tree
//! - Error: the error taxonomy shared by every store implementation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod criteria;
pub mod document;
pub mod error;
pub mod json;
pub mod order;
pub mod types;

pub use criteria::{compare_values, CompareOp, Criteria, ID_FIELD, REVISION_FIELD, SEQ_ID_FIELD};
pub use document::Document;
pub use error::{Error, Result};
pub use json::{
    contains_path, extract_at_path, fallback_at_path, get_at_path, get_or, set_at_path, JsonPath,
    PathParseError, PathSegment,
};
pub use order::{OrderDef, OrderField};
pub use types::DocId;
