//! Unique projected columns

use crate::common::*;
use docstore::{Error, SaveOptions};
use serde_json::{json, Value};

fn assert_email_violation(err: Error, email: &str) {
    match err {
        Error::UniqueConstraintViolation { key, value } => {
            assert_eq!(key, "email");
            assert_eq!(value, email);
        }
        other => panic!("expected a unique constraint violation, got {:?}", other),
    }
}

#[test]
fn second_id_with_same_email_is_rejected() {
    let store = users(unique_email_builder());
    let a = user("A", "Test User 1", "user@test.php");
    store.save(&"A".into(), &a).unwrap();

    let err = store
        .save(&"B".into(), &user("B", "Test User 2", "user@test.php"))
        .unwrap_err();

    assert_email_violation(err, "user@test.php");
    assert_eq!(store.get_item(&"A".into()).unwrap(), Some(a));
    assert_eq!(store.get_revision(&"A".into()).unwrap(), Some(1));
    assert!(!store.exists(&"B".into()).unwrap());
}

#[test]
fn create_reports_the_secondary_key_not_the_id() {
    let store = users(unique_email_builder());
    store
        .save_item(&"A".into(), &user("A", "a", "same@x"), SaveOptions::create())
        .unwrap();

    let err = store
        .save_item(&"B".into(), &user("B", "b", "same@x"), SaveOptions::create())
        .unwrap_err();
    assert_email_violation(err, "same@x");

    let err = store
        .save_item(&"A".into(), &user("A", "a", "other@x"), SaveOptions::create())
        .unwrap_err();
    assert!(matches!(err, Error::ItemAlreadyExists { .. }));
}

#[test]
fn upsert_with_unique_columns_updates_existing_id() {
    let store = users(unique_email_builder());
    store.save(&"A".into(), &user("A", "v1", "a@x")).unwrap();
    store.save(&"A".into(), &user("A", "v2", "a@x")).unwrap();
    store.save(&"A".into(), &user("A", "v3", "new@x")).unwrap();

    assert_eq!(store.get_revision(&"A".into()).unwrap(), Some(3));
    assert_eq!(
        store.get_item(&"A".into()).unwrap(),
        Some(user("A", "v3", "new@x"))
    );

    // the old address is free again
    store.save(&"B".into(), &user("B", "b", "a@x")).unwrap();
}

#[test]
fn update_into_a_taken_value_is_rejected() {
    let store = users(unique_email_builder());
    store.save(&"A".into(), &user("A", "a", "a@x")).unwrap();
    store.save(&"B".into(), &user("B", "b", "b@x")).unwrap();

    let err = store
        .save_item(&"B".into(), &user("B", "b", "a@x"), SaveOptions::update(1))
        .unwrap_err();

    assert_email_violation(err, "a@x");
    assert_eq!(store.get_item(&"B".into()).unwrap().unwrap().email, "b@x");
    assert_eq!(store.get_revision(&"B".into()).unwrap(), Some(1));
}

#[test]
fn absent_values_do_not_collide() {
    let store = open::<Value>(&sqlite(), unique_email_builder());
    store.save(&"a".into(), &json!({"name": "a"})).unwrap();
    store.save(&"b".into(), &json!({"name": "b"})).unwrap();
    assert_eq!(store.count(&docstore::Criteria::is_null("email")).unwrap(), 2);
}
