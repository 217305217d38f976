//! Relational document store engine
//!
//! This crate stores JSON documents in one relational table:
//! - backend: the execution contract a driver implements (`Connection`)
//! - dialect: MySQL and SQLite renderings of the statements we issue
//! - config: validated `StoreConfig` with a fluent builder and TOML loading
//! - projection: body fields mirrored into real columns, and `TableLayout`
//! - compiler: `Criteria` to SQL predicates with bound parameters
//! - store / save / iterate / backfill: the `TableStore` façade
//! - memory: `MemoryStore`, the unbatched reference implementation
//!
//! The engine never generates ids and never opens connections; both are the
//! caller's.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod backfill;
mod codec;
pub mod compiler;
pub mod config;
pub mod dialect;
pub mod iterate;
pub mod memory;
pub mod projection;
pub mod save;
pub mod store;
pub mod traits;

pub use backend::{
    classify_mysql_error, BackendError, CommandResult, Connection, ErrorClass, QueryResult, Row,
    SqlValue, Statement,
};
pub use backfill::BackfillReport;
pub use compiler::{CriteriaCompiler, FieldTarget, SqlFragment};
pub use config::{IdEncoding, StoreConfig, StoreConfigBuilder};
pub use dialect::{Dialect, MySqlDialect, SqliteDialect};
pub use iterate::{DocumentCursor, IdBatches, PagePlan};
pub use memory::MemoryStore;
pub use projection::{
    ColumnDef, ColumnKind, ColumnProjection, ColumnType, IndexDef, ProjectionPolicy, TableLayout,
};
pub use save::SaveOptions;
pub use store::TableStore;
pub use traits::{DocumentStore, DocumentStream};
