//! File-backed databases and TOML configuration

use crate::common::*;
use docstore::{Criteria, SaveOptions, SqliteConnection, StoreConfig, TableStore};
use std::sync::Arc;
use tempfile::TempDir;

const CONFIG: &str = r#"
table = "users"
id_path = "id"
batch_size = 2

[[columns]]
name = "email"
path = "email"
unique = true
"#;

#[test]
fn documents_survive_reopening() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("docs.db");

    {
        let conn = Arc::new(SqliteConnection::open(&path).unwrap());
        let config = StoreConfig::from_toml_str(CONFIG).unwrap();
        conn.create_table(&config.table_layout()).unwrap();
        let store: TableStore<User, _> = TableStore::new(conn, config);
        for (id, email) in [("A", "a@x"), ("B", "b@x"), ("C", "c@x")] {
            store
                .save_item(&id.into(), &user(id, id, email), SaveOptions::create())
                .unwrap();
        }
        store
            .save_item(&"B".into(), &user("B", "b2", "b@x"), SaveOptions::update(1))
            .unwrap();
    }

    let conn = Arc::new(SqliteConnection::open(&path).unwrap());
    let config = StoreConfig::from_toml_str(CONFIG).unwrap();
    conn.create_table(&config.table_layout()).unwrap();
    let store: TableStore<User, _> = TableStore::new(conn, config);

    assert_eq!(store.get_item(&"B".into()).unwrap(), Some(user("B", "b2", "b@x")));
    assert_eq!(store.get_revision(&"B".into()).unwrap(), Some(2));
    assert_eq!(store.count(&Criteria::all()).unwrap(), 3);
    assert!(store
        .save(&"D".into(), &user("D", "d", "c@x"))
        .unwrap_err()
        .is_conflict());
}

#[test]
fn config_file_is_loaded_and_validated() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("store.toml");
    std::fs::write(&good, CONFIG).unwrap();
    let config = StoreConfig::from_file(&good).unwrap();
    assert_eq!(config.table(), "users");
    assert_eq!(config.batch_size(), 2);
    assert!(config.has_unique_columns());

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "table = \"users\"\n[[columns]]\nname = \"body\"\npath = \"x\"\n").unwrap();
    assert!(matches!(
        StoreConfig::from_file(&bad).unwrap_err(),
        docstore::Error::InvalidConfig(_)
    ));
}
