// Query-cache behavior: structural hits across distinct plan objects,
// misses on any structural difference, LRU eviction, clear(), and
// invalidation when a referenced table is dropped.

mod common;

use common::*;
use fusedb::execution::BufferingConsumer;
use fusedb::types::{CmpOp, Value};
use std::sync::Arc;

#[test]
fn structurally_equal_plans_hit() {
    let db = test_db();
    let oid = create_test_table(&db);

    let q1 = Arc::new(order_by(
        scan(oid, Some(cmp(CmpOp::Ge, col(0), int(20))), vec![0, 1]),
        vec![(0, false)],
    ));
    let txn = db.begin();
    let mut consumer = BufferingConsumer::new();
    db.execute(&q1, &txn, &[], &mut consumer, None).unwrap();
    assert_eq!(db.cache().size(), 1);
    let misses_after_first = db.cache().stats().misses;

    // Fresh objects, same shape: observed as a hit.
    let q1_again = Arc::new(order_by(
        scan(oid, Some(cmp(CmpOp::Ge, col(0), int(20))), vec![0, 1]),
        vec![(0, false)],
    ));
    let mut consumer = BufferingConsumer::new();
    db.execute(&q1_again, &txn, &[], &mut consumer, None).unwrap();
    assert_eq!(db.cache().size(), 1);
    let stats = db.cache().stats();
    assert_eq!(stats.misses, misses_after_first);
    assert!(stats.hits >= 1);

    // Flipping one sort direction is a different plan.
    let q2 = Arc::new(order_by(
        scan(oid, Some(cmp(CmpOp::Ge, col(0), int(20))), vec![0, 1]),
        vec![(0, true)],
    ));
    let mut consumer = BufferingConsumer::new();
    db.execute(&q2, &txn, &[], &mut consumer, None).unwrap();
    assert_eq!(db.cache().size(), 2);
    assert!(db.cache().stats().misses > misses_after_first);
    db.commit(&txn).unwrap();
}

#[test]
fn equal_plans_hash_equally() {
    let db = test_db();
    let oid = create_test_table(&db);
    let a = scan(oid, Some(cmp(CmpOp::Ge, col(0), int(20))), vec![0, 1]);
    let b = scan(oid, Some(cmp(CmpOp::Ge, col(0), int(20))), vec![0, 1]);
    assert_eq!(a, b);
    assert_eq!(a.structural_hash(), b.structural_hash());
    let c = scan(oid, Some(cmp(CmpOp::Ge, col(0), int(21))), vec![0, 1]);
    assert_ne!(a, c);
}

#[test]
fn clear_forgets_everything() {
    let db = test_db();
    let oid = create_test_table(&db);
    let plan = Arc::new(scan(oid, None, vec![0]));
    run(&db, scan(oid, None, vec![0]), &[]);
    assert_eq!(db.cache().size(), 1);
    db.cache().clear();
    assert_eq!(db.cache().size(), 0);
    assert!(db.cache().find(&plan).is_none());
}

#[test]
fn capacity_evicts_least_recently_used() {
    let db = fusedb::Database::new(fusedb::EngineConfig {
        query_cache_capacity: 2,
        tile_group_capacity: 10,
        batch_size: 16,
        worker_threads: 1,
        enable_zone_maps: true,
    });
    let oid = create_test_table(&db);

    let plans: Vec<_> = (0..3)
        .map(|i| Arc::new(scan(oid, Some(cmp(CmpOp::Ge, col(0), int(i * 100))), vec![0])))
        .collect();
    let txn = db.begin();
    for plan in &plans {
        let mut consumer = BufferingConsumer::new();
        db.execute(plan, &txn, &[], &mut consumer, None).unwrap();
    }
    db.commit(&txn).unwrap();
    assert_eq!(db.cache().size(), 2);
    // The first plan was least recently used and must be gone.
    assert!(db.cache().find(&plans[0]).is_none());
    assert!(db.cache().find(&plans[2]).is_some());
}

#[test]
fn dropping_a_table_purges_its_plans() {
    let db = test_db();
    let oid = create_test_table(&db);
    let other = db
        .create_table(
            "other",
            fusedb::catalog::Schema::new(vec![fusedb::catalog::Column::new(
                "x",
                fusedb::types::LogicalType::Integer,
            )]),
        )
        .unwrap();
    {
        let txn = db.begin();
        other.insert(&txn, vec![Value::integer(1)]).unwrap();
        db.commit(&txn).unwrap();
    }

    run(&db, scan(oid, None, vec![0]), &[]);
    run(&db, scan(other.oid(), None, vec![0]), &[]);
    assert_eq!(db.cache().size(), 2);

    db.drop_table("t").unwrap();
    assert_eq!(db.cache().size(), 1);
    let survivor = Arc::new(scan(other.oid(), None, vec![0]));
    assert!(db.cache().find(&survivor).is_some());
}

#[test]
fn repeated_execution_is_idempotent() {
    let db = test_db();
    let oid = create_test_table(&db);
    let mut first: Option<Vec<Vec<Value>>> = None;
    for _ in 0..3 {
        let rows = run(
            &db,
            order_by(scan(oid, Some(cmp(CmpOp::Ge, col(0), int(100))), vec![0, 1]), vec![(0, false)]),
            &[],
        );
        match &first {
            None => first = Some(rows),
            Some(expected) => assert_eq!(&rows, expected),
        }
    }
}
