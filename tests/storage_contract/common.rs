//! Shared fixtures for the storage contract suite

#![allow(dead_code)]

use docstore::{
    ColumnProjection, Document, DocumentStream, Result, SqliteConnection, StoreConfig,
    StoreConfigBuilder, TableStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Entity used throughout the suite; `id` lives in the body and is
/// reinjected from the id column on read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

pub fn user(id: &str, name: &str, email: &str) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
    }
}

/// Route engine logs to the test harness; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn sqlite() -> Arc<SqliteConnection> {
    init_tracing();
    Arc::new(SqliteConnection::open_in_memory().unwrap())
}

/// `users` table keyed by the `id` field
pub fn users_builder() -> StoreConfigBuilder {
    StoreConfig::builder("users").id_path("id")
}

/// `users` with a unique `email` column
pub fn unique_email_builder() -> StoreConfigBuilder {
    users_builder().column(ColumnProjection::new("email").unique())
}

/// Create the table for `builder` on `conn` and open a store over it
pub fn open<D: Document>(
    conn: &Arc<SqliteConnection>,
    builder: StoreConfigBuilder,
) -> TableStore<D, SqliteConnection> {
    let config = builder.build().unwrap();
    conn.create_table(&config.table_layout()).unwrap();
    TableStore::new(conn.clone(), config)
}

pub fn users(builder: StoreConfigBuilder) -> TableStore<User, SqliteConnection> {
    open(&sqlite(), builder)
}

pub fn collect<D>(items: impl Iterator<Item = Result<D>>) -> Vec<D> {
    items.collect::<Result<Vec<_>>>().unwrap()
}

pub fn collect_stream<D>(stream: DocumentStream<'_, D>) -> Vec<D> {
    collect(stream)
}

pub fn ids(users: &[User]) -> Vec<&str> {
    users.iter().map(|u| u.id.as_str()).collect()
}

/// Raw body text of `id` as stored
pub fn raw_body(conn: &SqliteConnection, table: &str, id: &str) -> String {
    use docstore::{Connection, SqlValue, Statement};
    let row = conn
        .query(&Statement::with_params(
            format!("SELECT \"body\" FROM \"{}\" WHERE \"id\" = ?", table),
            vec![SqlValue::from(id)],
        ))
        .unwrap()
        .fetch_one()
        .unwrap();
    row.get("body").and_then(SqlValue::as_text).unwrap().to_string()
}
