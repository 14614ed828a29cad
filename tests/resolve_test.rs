//! Integration tests for term resolution against the in-memory store.

use std::sync::Arc;
use std::thread;

use kvwhere::prelude::*;
use kvwhere::query::resolve;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn unordered_store() -> MemoryStore {
    MemoryStore::from_snapshot_json(
        r#"{
            "keys": {
                "user:id": { "set": ["1", "2", "3", "4"] },
                "user:idx:color:red": { "set": ["1", "3"] },
                "user:idx:color:blue": { "set": ["2"] },
                "user:idx:color:green": { "set": ["4"] },
                "user:uni:name": { "hash": { "alice": "1", "bob": "2", "zed": "404" } },
                "group:colors": { "set": ["red", "blue"] },
                "group:names": { "set": ["alice", "bob", "carol"] },
                "group:ids": { "set": ["3", "4"] }
            }
        }"#,
    )
    .unwrap()
}

fn ordered_store() -> MemoryStore {
    MemoryStore::from_snapshot_json(
        r#"{
            "keys": {
                "post:id": { "sorted_set": { "1": 10.0, "2": 20.0, "3": 30.0 } },
                "post:idx:tag:rust": { "sorted_set": { "1": 1.0, "3": 2.0 } },
                "post:idx:tag:go": { "sorted_set": { "2": 5.0 } },
                "post:uni:slug": { "hash": { "hello": "2", "gone": "9" } },
                "group:slugs": { "sorted_set": { "hello": 1.0, "gone": 2.0, "nope": 3.0 } },
                "group:tags": { "sorted_set": { "rust": 1.0, "go": 2.0 } }
            }
        }"#,
    )
    .unwrap()
}

fn members(store: &MemoryStore, acc: &Accumulator) -> Vec<String> {
    store.transaction(|tx| acc.members(tx)).unwrap()
}

#[test]
fn test_unique_indirection() -> Result<()> {
    init_logging();
    let store = unordered_store();
    let resolver = Resolver::default();

    let acc = Accumulator::unordered("q:literal");
    let resolution = Resolution::new("user", "name", acc.clone()).with_unique(true);
    assert_eq!(resolver.resolve(&store, &resolution, &[Term::literal("alice")])?, 1);
    assert_eq!(members(&store, &acc), vec!["1"]);

    let acc = Accumulator::unordered("q:keyref");
    let resolution = Resolution::new("user", "name", acc.clone()).with_unique(true);
    assert_eq!(
        resolver.resolve(&store, &resolution, &[Term::key_ref("group:names")])?,
        2
    );
    assert_eq!(members(&store, &acc), vec!["1", "2"]);

    Ok(())
}

#[test]
fn test_non_unique_field_union() -> Result<()> {
    init_logging();
    let store = unordered_store();

    let count = resolve(
        &store,
        "user",
        CollectionKind::Unordered,
        "q",
        "color",
        false,
        &[Term::literal("red"), Term::literal("blue")],
    )?;
    assert_eq!(count, 3);
    assert_eq!(members(&store, &Accumulator::unordered("q")), vec!["1", "2", "3"]);

    Ok(())
}

#[test]
fn test_key_ref_equals_separate_literals() -> Result<()> {
    init_logging();
    let store = unordered_store();
    let resolver = Resolver::default();

    let by_ref = Accumulator::unordered("q:ref");
    resolver.resolve(
        &store,
        &Resolution::new("user", "color", by_ref.clone()),
        &[Term::key_ref("group:colors")],
    )?;

    let by_literal = Accumulator::unordered("q:lit");
    resolver.resolve(
        &store,
        &Resolution::new("user", "color", by_literal.clone()),
        &[Term::literal("red"), Term::literal("blue")],
    )?;

    assert_eq!(members(&store, &by_ref), members(&store, &by_literal));
    Ok(())
}

#[test]
fn test_union_monotonicity_and_order_independence() -> Result<()> {
    init_logging();
    let store = unordered_store();
    let resolver = Resolver::default();

    let t1 = vec![Term::literal("blue")];
    let t2 = vec![Term::literal("green"), Term::key_ref("group:colors")];
    let combined: Vec<Term> = t1.iter().chain(t2.iter()).cloned().collect();
    let reversed: Vec<Term> = combined.iter().rev().cloned().collect();

    let small = Accumulator::unordered("q:small");
    resolver.resolve(&store, &Resolution::new("user", "color", small.clone()), &t1)?;

    let large = Accumulator::unordered("q:large");
    resolver.resolve(&store, &Resolution::new("user", "color", large.clone()), &combined)?;

    let backwards = Accumulator::unordered("q:backwards");
    resolver.resolve(&store, &Resolution::new("user", "color", backwards.clone()), &reversed)?;

    let large_members = members(&store, &large);
    for id in members(&store, &small) {
        assert!(large_members.contains(&id));
    }
    assert_eq!(large_members, members(&store, &backwards));
    assert_eq!(large_members, vec!["1", "2", "3", "4"]);

    Ok(())
}

#[test]
fn test_validity_filtering_on_identifier_field() -> Result<()> {
    init_logging();
    let store = unordered_store();

    let count = resolve(
        &store,
        "user",
        CollectionKind::Unordered,
        "q",
        "id",
        false,
        &[Term::literal("1"), Term::literal("404"), Term::literal("")],
    )?;
    assert_eq!(count, 1);

    // The unique map points "zed" at an id that no longer exists.
    let count = resolve(
        &store,
        "user",
        CollectionKind::Unordered,
        "q:zed",
        "name",
        true,
        &[Term::literal("zed")],
    )?;
    assert_eq!(count, 0);

    let ordered = ordered_store();
    let count = resolve(
        &ordered,
        "post",
        CollectionKind::Ordered,
        "q",
        "slug",
        true,
        &[Term::key_ref("group:slugs")],
    )?;
    assert_eq!(count, 1);

    Ok(())
}

#[test]
fn test_identifier_key_ref_unions_collection() -> Result<()> {
    init_logging();
    let store = unordered_store();

    let count = resolve(
        &store,
        "user",
        CollectionKind::Unordered,
        "q",
        "id",
        true,
        &[Term::key_ref("group:ids"), Term::literal("1")],
    )?;
    assert_eq!(count, 3);
    assert_eq!(members(&store, &Accumulator::unordered("q")), vec!["1", "3", "4"]);

    Ok(())
}

#[test]
fn test_ordered_scores_come_from_identifier_collection() -> Result<()> {
    init_logging();
    let store = ordered_store();
    let resolver = Resolver::default();

    let acc = Accumulator::ordered("q:slug");
    let resolution = Resolution::new("post", "slug", acc.clone()).with_unique(true);
    resolver.resolve(&store, &resolution, &[Term::literal("hello")])?;

    let acc_ids = Accumulator::ordered("q:ids");
    resolver.resolve(
        &store,
        &Resolution::new("post", "id", acc_ids.clone()),
        &[Term::literal("3"), Term::literal("1"), Term::literal("7")],
    )?;

    store.transaction(|tx| {
        assert_eq!(acc.scored_members(tx)?, vec![("2".to_string(), 20.0)]);
        assert_eq!(
            acc_ids.scored_members(tx)?,
            vec![("1".to_string(), 10.0), ("3".to_string(), 30.0)]
        );
        Ok(())
    })?;

    Ok(())
}

#[test]
fn test_ordered_indexed_field() -> Result<()> {
    init_logging();
    let store = ordered_store();

    let acc = Accumulator::ordered("q");
    let count = Resolver::default().resolve(
        &store,
        &Resolution::new("post", "tag", acc.clone()),
        &[Term::key_ref("group:tags")],
    )?;
    assert_eq!(count, 3);

    store.transaction(|tx| {
        assert_eq!(
            acc.scored_members(tx)?,
            vec![
                ("1".to_string(), 10.0),
                ("2".to_string(), 20.0),
                ("3".to_string(), 30.0)
            ]
        );
        Ok(())
    })?;

    Ok(())
}

#[test]
fn test_stale_entries_never_reach_the_accumulator() -> Result<()> {
    init_logging();
    let store = MemoryStore::from_snapshot_json(
        r#"{
            "keys": {
                "user:id": { "set": ["1", "2"] },
                "user:idx:color:red": { "set": ["1", "99"] },
                "tmp:ids": { "set": ["2", "77"] }
            }
        }"#,
    )?;

    let count = resolve(
        &store,
        "user",
        CollectionKind::Unordered,
        "q:color",
        "color",
        false,
        &[Term::literal("red")],
    )?;
    assert_eq!(count, 1);
    assert_eq!(members(&store, &Accumulator::unordered("q:color")), vec!["1"]);

    let count = resolve(
        &store,
        "user",
        CollectionKind::Unordered,
        "q:id",
        "id",
        false,
        &[Term::key_ref("tmp:ids")],
    )?;
    assert_eq!(count, 1);
    assert_eq!(members(&store, &Accumulator::unordered("q:id")), vec!["2"]);

    Ok(())
}

#[test]
fn test_ordered_stale_entries_and_repeated_terms() -> Result<()> {
    init_logging();
    let store = MemoryStore::from_snapshot_json(
        r#"{
            "keys": {
                "post:id": { "sorted_set": { "1": 10.0, "2": 20.0 } },
                "post:idx:tag:rust": { "sorted_set": { "1": 5.0, "99": 1.0 } },
                "post:idx:tag:go": { "sorted_set": { "2": 20.0 } },
                "tmp:ids": { "sorted_set": { "2": 7.0, "77": 1.0 } }
            }
        }"#,
    )?;

    let acc = Accumulator::ordered("q:tag");
    let count = Resolver::default().resolve(
        &store,
        &Resolution::new("post", "tag", acc.clone()),
        &[Term::literal("rust"), Term::literal("go"), Term::literal("go")],
    )?;
    assert_eq!(count, 2);

    let ids = Accumulator::ordered("q:id");
    let count = Resolver::default().resolve(
        &store,
        &Resolution::new("post", "id", ids.clone()),
        &[Term::key_ref("tmp:ids"), Term::key_ref("tmp:ids")],
    )?;
    assert_eq!(count, 1);

    store.transaction(|tx| {
        assert_eq!(
            acc.scored_members(tx)?,
            vec![("1".to_string(), 10.0), ("2".to_string(), 20.0)]
        );
        assert_eq!(ids.scored_members(tx)?, vec![("2".to_string(), 20.0)]);
        Ok(())
    })?;

    Ok(())
}

#[test]
fn test_cardinality_read_is_idempotent() -> Result<()> {
    init_logging();
    let store = unordered_store();
    let acc = Accumulator::unordered("q");

    let count = Resolver::default().resolve(
        &store,
        &Resolution::new("user", "color", acc.clone()),
        &[Term::literal("red")],
    )?;

    let (first, second) = store.transaction(|tx| Ok((acc.cardinality(tx)?, acc.cardinality(tx)?)))?;
    assert_eq!(first, count);
    assert_eq!(second, count);

    Ok(())
}

#[test]
fn test_empty_terms() -> Result<()> {
    init_logging();
    let store = unordered_store();

    let count = resolve(&store, "user", CollectionKind::Unordered, "fresh", "color", false, &[])?;
    assert_eq!(count, 0);
    assert_eq!(store.transaction(|tx| tx.key_type("fresh"))?, None);

    store.transaction(|tx| tx.set_add("existing", "x"))?;
    let count = resolve(&store, "user", CollectionKind::Unordered, "existing", "color", false, &[])?;
    assert_eq!(count, 1);

    Ok(())
}

#[test]
fn test_kind_mismatch_surfaces_and_rolls_back() {
    init_logging();
    let store = unordered_store();

    let result = resolve(
        &store,
        "user",
        CollectionKind::Ordered,
        "q",
        "color",
        false,
        &[Term::literal("red")],
    );
    match result {
        Err(KvWhereError::WrongType { .. }) => {}
        other => panic!("Expected wrong type error, got {other:?}"),
    }
    assert_eq!(store.transaction(|tx| tx.key_type("q")).unwrap(), None);
}

#[test]
fn test_concurrent_resolutions_on_distinct_accumulators() {
    init_logging();
    let store = Arc::new(unordered_store());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let term = if i % 2 == 0 { "red" } else { "blue" };
                let dest = format!("q:{i}");
                resolve(
                    store.as_ref(),
                    "user",
                    CollectionKind::Unordered,
                    &dest,
                    "color",
                    false,
                    &[Term::literal(term)],
                )
                .unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let count = handle.join().unwrap();
        assert_eq!(count, if i % 2 == 0 { 2 } else { 1 });
    }
}

#[test]
fn test_close_through_shared_handle() {
    init_logging();
    let store = Arc::new(unordered_store());
    let shared = Arc::clone(&store);

    thread::spawn(move || shared.close().unwrap()).join().unwrap();

    assert!(store.is_closed());
    let result = resolve(
        store.as_ref(),
        "user",
        CollectionKind::Unordered,
        "q",
        "color",
        false,
        &[Term::literal("red")],
    );
    assert!(result.is_err());
}

#[test]
fn test_custom_layout() -> Result<()> {
    init_logging();
    let store = MemoryStore::from_snapshot_json(
        r#"{
            "keys": {
                "user/pk": { "set": ["a", "b"] },
                "user/by/color/red": { "set": ["a"] },
                "user/one/email": { "hash": { "b@x.io": "b" } }
            }
        }"#,
    )?;

    let config = ResolverConfig::from_json_str(
        r#"{
            "id_field": "uuid",
            "keys": {
                "separator": "/",
                "id_segment": "pk",
                "index_segment": "by",
                "unique_segment": "one"
            }
        }"#,
    )?;
    let resolver = Resolver::new(config)?;

    let count = resolver.resolve(
        &store,
        &Resolution::new("user", "color", Accumulator::unordered("q:1")),
        &[Term::literal("red")],
    )?;
    assert_eq!(count, 1);

    let count = resolver.resolve(
        &store,
        &Resolution::new("user", "email", Accumulator::unordered("q:2")).with_unique(true),
        &[Term::literal("b@x.io")],
    )?;
    assert_eq!(count, 1);

    let count = resolver.resolve(
        &store,
        &Resolution::new("user", "uuid", Accumulator::unordered("q:3")),
        &[Term::literal("a"), Term::literal("b")],
    )?;
    assert_eq!(count, 2);

    Ok(())
}
