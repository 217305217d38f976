//! Revision counting, optimistic updates and idempotent replays

use crate::common::*;
use docstore::{ColumnProjection, Error, SaveOptions};
use serde_json::{json, Value};

#[test]
fn create_update_and_stale_update() {
    let store = users(users_builder());
    let id = "A".into();

    store
        .save_item(&id, &user("A", "v1", "a@x"), SaveOptions::create())
        .unwrap();
    assert_eq!(store.get_revision(&id).unwrap(), Some(1));

    store
        .save_item(&id, &user("A", "v2", "a@x"), SaveOptions::update(1))
        .unwrap();
    assert_eq!(store.get_revision(&id).unwrap(), Some(2));

    let err = store
        .save_item(&id, &user("A", "v3", "a@x"), SaveOptions::update(1))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnexpectedRevision { expected: 1, actual: Some(2), .. }
    ));
    assert_eq!(store.get_revision(&id).unwrap(), Some(2));
    assert_eq!(store.get_item(&id).unwrap().unwrap().name, "v2");
}

#[test]
fn upserts_count_revisions() {
    let store = users(users_builder());
    let id = "A".into();
    for n in 1..=4u64 {
        store.save(&id, &user("A", &format!("v{}", n), "a@x")).unwrap();
        assert_eq!(store.get_revision(&id).unwrap(), Some(n));
    }
    assert_eq!(store.get_item(&id).unwrap().unwrap().name, "v4");
}

#[test]
fn update_of_missing_row_is_not_found() {
    let store = users(users_builder());
    let err = store
        .save_item(&"ghost".into(), &user("ghost", "g", "g@x"), SaveOptions::update(3))
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("ghost"));
    assert!(!store.exists(&"ghost".into()).unwrap());
}

#[test]
fn create_collision_without_idempotency() {
    let store = users(users_builder());
    let a = user("A", "a", "a@x");

    store.save_item(&"A".into(), &a, SaveOptions::create()).unwrap();
    let err = store
        .save_item(&"A".into(), &a, SaveOptions::create())
        .unwrap_err();

    assert!(matches!(err, Error::ItemAlreadyExists { ref id } if id == "A"));
    assert!(err.is_conflict());
    assert_eq!(store.get_revision(&"A".into()).unwrap(), Some(1));
}

#[test]
fn idempotent_create_replay_succeeds() {
    let store = users(users_builder());
    let a = user("A", "a", "a@x");
    let options = SaveOptions::create().with_idempotency();

    store.save_item(&"A".into(), &a, options).unwrap();
    store.save_item(&"A".into(), &a, options).unwrap();

    assert_eq!(store.get_revision(&"A".into()).unwrap(), Some(1));
    assert_eq!(store.get_item(&"A".into()).unwrap(), Some(a));
}

#[test]
fn idempotent_create_with_different_body_fails() {
    let store = users(users_builder());
    let options = SaveOptions::create().with_idempotency();

    store
        .save_item(&"A".into(), &user("A", "a", "a@x"), options)
        .unwrap();
    let err = store
        .save_item(&"A".into(), &user("A", "b", "a@x"), options)
        .unwrap_err();
    assert!(matches!(err, Error::ItemAlreadyExists { .. }));
}

#[test]
fn idempotent_create_after_update_fails() {
    let store = users(users_builder());
    let a = user("A", "a", "a@x");
    let options = SaveOptions::create().with_idempotency();

    store.save_item(&"A".into(), &a, options).unwrap();
    store.save_item(&"A".into(), &a, SaveOptions::update(1)).unwrap();

    let err = store.save_item(&"A".into(), &a, options).unwrap_err();
    assert!(matches!(err, Error::ItemAlreadyExists { .. }));
}

#[test]
fn idempotent_update_replay_succeeds() {
    let store = users(users_builder());
    let id = "A".into();
    store
        .save_item(&id, &user("A", "v1", "a@x"), SaveOptions::create())
        .unwrap();

    let v2 = user("A", "v2", "a@x");
    let options = SaveOptions::update(1).with_idempotency();
    store.save_item(&id, &v2, options).unwrap();
    store.save_item(&id, &v2, options).unwrap();
    assert_eq!(store.get_revision(&id).unwrap(), Some(2));

    let err = store
        .save_item(&id, &user("A", "other", "a@x"), options)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnexpectedRevision { expected: 1, actual: Some(2), .. }
    ));

    let err = store
        .save_item(&id, &v2, SaveOptions::update(1))
        .unwrap_err();
    assert!(matches!(err, Error::UnexpectedRevision { .. }));
}

#[test]
fn replays_compare_extracted_columns() {
    let store = open::<Value>(
        &sqlite(),
        users_builder().column(ColumnProjection::new("secret").extract()),
    );
    let id = "A".into();
    let create = SaveOptions::create().with_idempotency();

    store.save_item(&id, &json!({"secret": "s1"}), create).unwrap();
    store.save_item(&id, &json!({"secret": "s1"}), create).unwrap();
    // same body text, different extracted value
    let err = store
        .save_item(&id, &json!({"secret": "DIFFERENT"}), create)
        .unwrap_err();
    assert!(matches!(err, Error::ItemAlreadyExists { .. }));

    let update = SaveOptions::update(1).with_idempotency();
    store.save_item(&id, &json!({"secret": "s2"}), update).unwrap();
    store.save_item(&id, &json!({"secret": "s2"}), update).unwrap();
    let err = store
        .save_item(&id, &json!({"secret": "s3"}), update)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnexpectedRevision { expected: 1, actual: Some(2), .. }
    ));
    assert_eq!(
        store.get_item(&id).unwrap(),
        Some(json!({"id": "A", "secret": "s2"}))
    );
}

#[test]
fn revision_path_is_reinjected_and_ignored_on_write() {
    let conn = sqlite();
    let store = open::<Value>(&conn, users_builder().revision_path("meta.rev"));
    let id = "a".into();

    store
        .save_item(&id, &json!({"n": 1, "meta": {"rev": 99}}), SaveOptions::create())
        .unwrap();
    assert_eq!(
        store.get_item(&id).unwrap(),
        Some(json!({"id": "a", "n": 1, "meta": {"rev": 1}}))
    );

    let mut doc = store.get_item(&id).unwrap().unwrap();
    doc["n"] = json!(2);
    store.save_item(&id, &doc, SaveOptions::update(1)).unwrap();
    assert_eq!(store.get_item(&id).unwrap().unwrap()["meta"]["rev"], json!(2));

    // the replayed body matches even though the caller's copy carries a stale revision
    store
        .save_item(&id, &doc, SaveOptions::update(1).with_idempotency())
        .unwrap();
}
