//! Round trips, deletes and lookups

use crate::common::*;
use docstore::{Criteria, DocId, Error, IdEncoding, OrderDef, SaveOptions};
use serde_json::{json, Value};

#[test]
fn save_then_get_round_trips() {
    let store = users(users_builder());
    let a = user("A", "Test User 1", "user@test.php");

    store.save(&"A".into(), &a).unwrap();

    assert_eq!(store.get_item(&"A".into()).unwrap(), Some(a));
    assert_eq!(store.get_item(&"missing".into()).unwrap(), None);
}

#[test]
fn id_field_is_not_stored_in_body() {
    let conn = sqlite();
    let store = open::<User>(&conn, users_builder());
    store
        .save(&"A".into(), &user("A", "Test User 1", "user@test.php"))
        .unwrap();

    let body: Value = serde_json::from_str(&raw_body(&conn, "users", "A")).unwrap();
    assert_eq!(body, json!({"name": "Test User 1", "email": "user@test.php"}));
}

#[test]
fn criteria_listing_follows_insertion_order() {
    let store = users(users_builder());
    store
        .save(&"A".into(), &user("A", "Test User 1", "user@test.php"))
        .unwrap();
    store
        .save(&"B".into(), &user("B", "Test User 2", "user@test.php"))
        .unwrap();

    let found = collect(store.list_by_criteria(
        &Criteria::eq("email", "user@test.php"),
        &OrderDef::new(),
        None,
    ));
    assert_eq!(ids(&found), ["A", "B"]);

    let none = collect(store.list_by_criteria(
        &Criteria::eq("email", "no@test.php"),
        &OrderDef::new(),
        None,
    ));
    assert!(none.is_empty());
}

#[test]
fn remove_item_is_idempotent() {
    let store = users(users_builder());
    store.save(&"A".into(), &user("A", "a", "a@x")).unwrap();

    store.remove_item(&"A".into()).unwrap();
    store.remove_item(&"A".into()).unwrap();

    assert!(!store.exists(&"A".into()).unwrap());
}

#[test]
fn remove_by_criteria_and_clear() {
    let store = users(users_builder());
    for (id, email) in [("A", "x@x"), ("B", "y@x"), ("C", "x@x")] {
        store.save(&id.into(), &user(id, id, email)).unwrap();
    }

    assert_eq!(store.remove_by_criteria(&Criteria::eq("email", "x@x")).unwrap(), 2);
    assert_eq!(store.count(&Criteria::all()).unwrap(), 1);
    assert_eq!(store.get_item(&"B".into()).unwrap().map(|u| u.id), Some("B".to_string()));

    store.clear().unwrap();
    assert_eq!(store.count(&Criteria::all()).unwrap(), 0);
}

#[test]
fn get_items_spans_id_batches_and_skips_missing() {
    let store = users(users_builder().id_batch_size(2));
    for id in ["A", "B", "C", "D", "E"] {
        store.save(&id.into(), &user(id, id, "e@x")).unwrap();
    }

    let wanted: Vec<DocId> = ["E", "A", "zz", "C", "B"].iter().map(|s| DocId::from(*s)).collect();
    let mut found = collect(store.get_items(&wanted));
    found.sort_by(|a, b| a.id.cmp(&b.id));

    assert_eq!(ids(&found), ["A", "B", "C", "E"]);
    assert!(collect(store.get_items(&[])).is_empty());
}

#[test]
fn count_exists_and_revision() {
    let store = users(users_builder());
    store.save(&"A".into(), &user("A", "a", "a@x")).unwrap();
    store.save(&"B".into(), &user("B", "b", "b@x")).unwrap();

    assert_eq!(store.count(&Criteria::all()).unwrap(), 2);
    assert_eq!(store.count(&Criteria::eq("name", "b")).unwrap(), 1);
    assert_eq!(store.count(&Criteria::eq("_id", "A")).unwrap(), 1);
    assert!(store.exists(&"A".into()).unwrap());
    assert_eq!(store.get_revision(&"A".into()).unwrap(), Some(1));
    assert_eq!(store.get_revision(&"nope".into()).unwrap(), None);
}

#[test]
fn boolean_combinators_and_null_checks() {
    let conn = sqlite();
    let store = open::<Value>(&conn, users_builder());
    store.save(&"a".into(), &json!({"n": 1, "tag": "x"})).unwrap();
    store.save(&"b".into(), &json!({"n": 2, "tag": null})).unwrap();
    store.save(&"c".into(), &json!({"n": 3})).unwrap();

    let count = |c: Criteria| store.count(&c).unwrap();
    assert_eq!(count(Criteria::is_null("tag")), 2);
    assert_eq!(count(Criteria::is_not_null("tag")), 1);
    assert_eq!(count(Criteria::or(vec![Criteria::eq("n", 1), Criteria::ge("n", 3)])), 2);
    assert_eq!(count(Criteria::and(vec![Criteria::gt("n", 1), Criteria::lt("n", 3)])), 1);
    assert_eq!(count(Criteria::not(Criteria::eq("n", 2))), 2);
    assert_eq!(count(Criteria::in_list("n", vec![json!(1), json!(3)])), 2);
    assert_eq!(count(Criteria::in_list("n", vec![])), 0);
    assert_eq!(count(Criteria::and(vec![])), 3);
    assert_eq!(count(Criteria::or(vec![])), 0);
}

#[test]
fn field_values_are_bound_not_interpolated() {
    let store = users(users_builder());
    store.save(&"A".into(), &user("A", "a", "a@x")).unwrap();

    let hostile = "x' OR '1' = '1";
    assert_eq!(store.count(&Criteria::eq("email", hostile)).unwrap(), 0);
    assert_eq!(store.count(&Criteria::eq("it's", "v")).unwrap(), 0);
}

#[test]
fn binary_ids_round_trip_as_hex() {
    let conn = sqlite();
    let store = open::<Value>(&conn, users_builder().id_encoding(IdEncoding::Binary));
    let id = DocId::new(vec![0x00, 0xff, 0x10]);

    store.save_item(&id, &json!({"n": 1}), SaveOptions::create()).unwrap();

    assert_eq!(
        store.get_item(&id).unwrap(),
        Some(json!({"id": "00ff10", "n": 1}))
    );
    assert_eq!(store.count(&Criteria::eq("_id", "00ff10")).unwrap(), 1);
    assert_eq!(store.count(&Criteria::eq("id", "00ff11")).unwrap(), 0);

    let err = store
        .save_item(&id, &json!({"n": 2}), SaveOptions::create())
        .unwrap_err();
    assert!(matches!(err, Error::ItemAlreadyExists { id } if id == "00ff10"));
}

#[test]
fn text_ids_must_be_utf8() {
    let store = open::<Value>(&sqlite(), users_builder());
    let err = store
        .save(&DocId::new(vec![0xff, 0xfe]), &json!({}))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidDataType(_)));
}

#[test]
fn documents_must_be_objects() {
    let store = open::<Value>(&sqlite(), users_builder());
    let err = store.save(&"a".into(), &json!([1, 2])).unwrap_err();
    assert!(matches!(err, Error::InvalidDataType(_)));
    assert!(!store.exists(&"a".into()).unwrap());
}

#[test]
fn oversized_body_is_rejected_and_not_written() {
    let store = open::<Value>(&sqlite(), users_builder().max_body_size(64));
    let big = json!({"text": "x".repeat(100)});

    let err = store.save(&"a".into(), &big).unwrap_err();
    assert!(err.is_storage());
    assert!(err.to_string().contains("exceeds maximum of 64 bytes"));
    assert!(store.get_item(&"a".into()).unwrap().is_none());

    store.save(&"a".into(), &json!({"text": "ok"})).unwrap();
    let err = store.save(&"a".into(), &big).unwrap_err();
    assert!(err.is_storage());
    assert_eq!(store.get_item(&"a".into()).unwrap(), Some(json!({"id": "a", "text": "ok"})));
    assert_eq!(store.get_revision(&"a".into()).unwrap(), Some(1));
}

#[test]
fn missing_table_is_a_storage_error() {
    let conn = sqlite();
    let config = users_builder().build().unwrap();
    let store: docstore::TableStore<User, _> = docstore::TableStore::new(conn, config);

    let err = store.get_item(&"A".into()).unwrap_err();
    assert!(err.is_storage());

    let mut listing = store.list_all(&OrderDef::new(), None);
    assert!(listing.next().unwrap().is_err());
    assert!(listing.next().is_none());
}
