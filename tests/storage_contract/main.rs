//! Storage Contract Test Suite
//!
//! Exercises the document store end to end over the SQLite driver:
//!
//! - `crud`: round trips, deletes, multi-id lookups, binary ids
//! - `revisions`: revision counting, stale updates, idempotent replays
//! - `uniqueness`: unique projected columns
//! - `iteration`: batched listings against the unbatched baseline
//! - `projections`: extract / load-fallback policies and column backfill
//! - `parity`: the same contract checks against `MemoryStore`
//! - `persistence`: file-backed databases
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test storage_contract
//!
//! # One module
//! cargo test --test storage_contract iteration::
//! ```

mod common;
mod crud;
mod iteration;
mod parity;
mod persistence;
mod revisions;
mod uniqueness;
