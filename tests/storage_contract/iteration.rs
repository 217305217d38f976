//! Batched listings produce the same sequence as the unbatched baseline

use crate::common::*;
use docstore::{
    Criteria, DocId, DocumentStore, MemoryStore, OrderDef, PagePlan, SaveOptions,
    SqliteConnection, TableStore,
};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const BATCH_SIZES: [usize; 4] = [1, 2, 10, 10_000];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n: Option<i64>,
    tag: String,
}

fn orders() -> Vec<OrderDef> {
    vec![
        OrderDef::new(),
        OrderDef::by_seq_id(),
        OrderDef::new().desc("_seq"),
        OrderDef::new().asc("n"),
        OrderDef::new().desc("n").asc("tag"),
        OrderDef::new().asc("tag").desc("_id"),
        OrderDef::new().desc("id"),
    ]
}

/// One store per batch size (0 = unbatched), all over the same table
fn stores(conn: &Arc<SqliteConnection>) -> Vec<(usize, TableStore<Entry, SqliteConnection>)> {
    let mut out = vec![(0, open::<Entry>(conn, users_builder().batch_size(0)))];
    for size in BATCH_SIZES {
        out.push((size, open::<Entry>(conn, users_builder().batch_size(size))));
    }
    out
}

fn fill(rows: &[Entry], store: &dyn DocumentStore<Entry>) {
    for row in rows {
        store
            .save_item(&DocId::from(row.id.as_str()), row, SaveOptions::upsert())
            .unwrap();
    }
}

fn row_strategy() -> impl Strategy<Value = Vec<Entry>> {
    prop::collection::vec(
        (prop::option::of(0i64..5), prop::sample::select(vec!["a", "b", "c"])),
        0..40,
    )
    .prop_map(|fields| {
        fields
            .into_iter()
            .enumerate()
            .map(|(i, (n, tag))| Entry {
                id: format!("r{:03}", i),
                n,
                tag: tag.to_string(),
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn batched_listings_match_unbatched(
        rows in row_strategy(),
        limit in prop::option::of(0u64..50),
        threshold in 0i64..5,
    ) {
        let conn = sqlite();
        let stores = stores(&conn);
        fill(&rows, &stores[0].1);

        let memory = MemoryStore::<Entry>::new();
        fill(&rows, &memory);

        let filters = [Criteria::all(), Criteria::ge("n", threshold)];
        for order in orders() {
            for filter in &filters {
                let baseline = collect(stores[0].1.list_by_criteria(filter, &order, limit));
                for (size, store) in &stores[1..] {
                    let batched = collect(store.list_by_criteria(filter, &order, limit));
                    prop_assert_eq!(&batched, &baseline, "batch size {} order {:?}", size, order);
                }
                let oracle = collect_stream(memory.list_by_criteria(filter, &order, limit));
                prop_assert_eq!(&oracle, &baseline, "memory store, order {:?}", order);
            }
        }
    }
}

#[test]
fn unordered_listing_is_insertion_order() {
    let conn = sqlite();
    let stores = stores(&conn);
    let rows: Vec<Entry> = (0..25)
        .map(|i| Entry {
            id: format!("z{:02}", 24 - i),
            n: Some(i % 3),
            tag: "t".into(),
        })
        .collect();
    fill(&rows, &stores[0].1);

    for (_, store) in &stores {
        assert_eq!(collect(store.list_all(&OrderDef::new(), None)), rows);
        let newest_first: Vec<Entry> = rows.iter().rev().take(7).cloned().collect();
        assert_eq!(
            collect(store.list_all(&OrderDef::new().desc("_seq"), Some(7))),
            newest_first
        );
    }
}

#[test]
fn limit_caps_every_plan() {
    let conn = sqlite();
    let stores = stores(&conn);
    let rows: Vec<Entry> = (0..12)
        .map(|i| Entry {
            id: format!("r{:02}", i),
            n: Some(i),
            tag: "t".into(),
        })
        .collect();
    fill(&rows, &stores[0].1);

    for (_, store) in &stores {
        for order in orders() {
            assert_eq!(collect(store.list_all(&order, Some(5))).len(), 5);
            assert_eq!(collect(store.list_all(&order, Some(0))).len(), 0);
            assert_eq!(collect(store.list_all(&order, Some(100))).len(), 12);
        }
    }
}

#[test]
fn plan_selection() {
    let conn = sqlite();
    let batched = open::<Value>(&conn, users_builder().batch_size(10));
    let single = open::<Value>(&conn, users_builder().batch_size(0));
    let plan = |store: &TableStore<Value, SqliteConnection>, order: OrderDef| {
        store.list_all(&order, None).plan().clone()
    };

    assert_eq!(plan(&batched, OrderDef::new()), PagePlan::SeqAscending);
    assert_eq!(plan(&batched, OrderDef::by_seq_id()), PagePlan::SeqAscending);
    assert_eq!(plan(&batched, OrderDef::new().desc("_seq")), PagePlan::SeqDescending);
    assert_eq!(
        plan(&batched, OrderDef::new().asc("n")),
        PagePlan::Offset {
            order: "json_extract(\"body\", '$.\"n\"') ASC, \"seq_id\" ASC".into()
        }
    );
    assert_eq!(
        plan(&batched, OrderDef::new().desc("_id")),
        PagePlan::Offset {
            order: "\"id\" DESC".into()
        }
    );
    assert_eq!(
        plan(&single, OrderDef::new()),
        PagePlan::Single {
            order: "\"seq_id\" ASC".into()
        }
    );
}

#[test]
fn abandoning_a_listing_early() {
    let conn = sqlite();
    let store = open::<Value>(&conn, users_builder().batch_size(2));
    for i in 0..10 {
        store.save(&format!("k{}", i).as_str().into(), &json!({"i": i})).unwrap();
    }

    let mut listing = store.list_all(&OrderDef::new(), None);
    let first = listing.next().unwrap().unwrap();
    assert_eq!(first["i"], json!(0));
    drop(listing);

    // rows inserted while a listing is open are picked up by the seek plan
    let mut listing = store.list_all(&OrderDef::new(), None);
    listing.next().unwrap().unwrap();
    store.save(&"late".into(), &json!({"i": 10})).unwrap();
    let rest: Vec<Value> = collect(listing);
    assert_eq!(rest.len(), 10);
    assert_eq!(rest.last().unwrap()["id"], json!("late"));
}
