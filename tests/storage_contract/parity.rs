//! The collection contract, checked against both store implementations

use crate::common::*;
use docstore::{Criteria, DocId, DocumentStore, MemoryStore, OrderDef, SaveOptions};

fn save(store: &dyn DocumentStore<User>, u: &User) {
    store
        .save_item(&DocId::from(u.id.as_str()), u, SaveOptions::upsert())
        .unwrap();
}

fn check_contract(store: &dyn DocumentStore<User>) {
    let a = user("A", "Test User 1", "user@test.php");
    let b = user("B", "Test User 2", "user@test.php");
    let c = user("C", "Test User 3", "other@test.php");
    for u in [&a, &b, &c] {
        save(store, u);
    }

    assert_eq!(store.get_item(&"B".into()).unwrap(), Some(b.clone()));
    assert_eq!(store.get_item(&"Z".into()).unwrap(), None);

    let matching = collect_stream(store.list_by_criteria(
        &Criteria::eq("email", "user@test.php"),
        &OrderDef::new(),
        None,
    ));
    assert_eq!(ids(&matching), ["A", "B"]);
    assert!(collect_stream(store.list_by_criteria(
        &Criteria::eq("email", "no@test.php"),
        &OrderDef::new(),
        None
    ))
    .is_empty());

    let by_name_desc = collect_stream(store.list_all(&OrderDef::new().desc("name"), Some(2)));
    assert_eq!(ids(&by_name_desc), ["C", "B"]);

    let mut many = collect_stream(store.get_items(&["C".into(), "A".into(), "Q".into()]));
    many.sort_by(|x, y| x.id.cmp(&y.id));
    assert_eq!(ids(&many), ["A", "C"]);

    // overwriting keeps the original position in insertion order
    let a2 = user("A", "Renamed", "user@test.php");
    save(store, &a2);
    let all = collect_stream(store.list_all(&OrderDef::new(), None));
    assert_eq!(all, vec![a2, b, c]);

    assert_eq!(
        store
            .remove_by_criteria(&Criteria::ne("email", "user@test.php"))
            .unwrap(),
        1
    );
    store.remove_item(&"A".into()).unwrap();
    store.remove_item(&"A".into()).unwrap();
    assert_eq!(ids(&collect_stream(store.list_all(&OrderDef::new(), None))), ["B"]);

    store.clear().unwrap();
    assert!(collect_stream(store.list_all(&OrderDef::new(), None)).is_empty());
}

#[test]
fn memory_store_contract() {
    check_contract(&MemoryStore::<User>::new());
}

#[test]
fn table_store_contract() {
    check_contract(&users(users_builder()));
}

#[test]
fn table_store_contract_unbatched() {
    check_contract(&users(users_builder().batch_size(0)));
}

#[test]
fn table_store_contract_with_email_column() {
    let store = users(
        users_builder().column(docstore::ColumnProjection::new("email").indexed()),
    );
    check_contract(&store);
}
