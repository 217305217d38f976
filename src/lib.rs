//! docstore - JSON document storage on top of a relational table
//!
//! Documents are stored as a JSON body per row, keyed by a caller-supplied
//! id, with an optimistic-concurrency revision, a backend-assigned sequence
//! id and optional projected columns for filtering and uniqueness.
//!
//! # Quick Start
//!
//! ```ignore
//! use docstore::{Criteria, OrderDef, SaveOptions, SqliteConnection, StoreConfig, TableStore};
//! use std::sync::Arc;
//!
//! let conn = Arc::new(SqliteConnection::open_in_memory()?);
//! let config = StoreConfig::builder("users").id_path("id").build()?;
//! conn.create_table(&config.table_layout())?;
//!
//! let users: TableStore<User, _> = TableStore::new(conn, config);
//! users.save_item(&"A".into(), &user, SaveOptions::create())?;
//!
//! for user in users.list_by_criteria(&Criteria::eq("email", "a@x"), &OrderDef::new(), None) {
//!     println!("{:?}", user?);
//! }
//! ```
//!
//! # Architecture
//!
//! - [`docstore_core`]: ids, paths, criteria, ordering, errors
//! - [`docstore_engine`]: the backend contract and the storage engine
//! - [`docstore_sqlite`]: the SQLite driver

pub use docstore_core::*;
pub use docstore_engine::*;
pub use docstore_sqlite::SqliteConnection;
