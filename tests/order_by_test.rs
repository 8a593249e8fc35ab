// ORDER BY and LIMIT: lexicographic sort keys, descending order, limit
// windows over sorted output (top-K fusion), limit over plain scans, and
// the parallel build path behind a parallel-capable consumer.

mod common;

use common::*;
use fusedb::execution::CountingConsumer;
use fusedb::types::{LogicalType, Value};
use std::sync::Arc;

#[test]
fn sort_descending_then_ascending_tiebreak() {
    let db = test_db();
    let oid = create_test_table(&db);
    let plan = order_by(scan(oid, None, vec![0, 1, 2, 3]), vec![(1, true), (0, false)]);
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 64);
    let b = ints(&rows, 1);
    for pair in b.windows(2) {
        assert!(pair[0] > pair[1], "b must be strictly decreasing: {pair:?}");
    }
}

#[test]
fn sort_ascending_matches_insertion_for_monotone_key() {
    let db = test_db();
    let oid = create_test_table(&db);
    let rows = run(&db, order_by(scan(oid, None, vec![0, 1]), vec![(0, false)]), &[]);
    assert_eq!(ints(&rows, 0), (0..64).map(|i| 10 * i).collect::<Vec<i64>>());
}

#[test]
fn limit_offset_windows_over_sorted_output() {
    let db = test_db();
    let oid = create_test_table(&db);

    let past_end = limit(order_by(scan(oid, None, vec![0, 1]), vec![(0, false)]), 99, 10);
    assert_eq!(run(&db, past_end, &[]).len(), 0);

    let last_row = limit(order_by(scan(oid, None, vec![0, 1]), vec![(0, false)]), 63, 10);
    let rows = run(&db, last_row, &[]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::integer(630));

    let first_five = limit(order_by(scan(oid, None, vec![0, 1]), vec![(0, false)]), 0, 5);
    assert_eq!(ints(&run(&db, first_five, &[]), 0), vec![0, 10, 20, 30, 40]);
}

#[test]
fn top_k_keeps_descending_heads() {
    let db = test_db();
    let oid = create_test_table(&db);
    let plan = limit(order_by(scan(oid, None, vec![0, 1]), vec![(0, true)]), 0, 3);
    assert_eq!(ints(&run(&db, plan, &[]), 0), vec![630, 620, 610]);
}

#[test]
fn limit_over_plain_scan_counts_from_scan_order() {
    let db = test_db();
    let oid = create_test_table(&db);
    let rows = run(&db, limit(scan(oid, None, vec![0]), 10, 7), &[]);
    assert_eq!(rows.len(), 7);
    assert_eq!(ints(&rows, 0), vec![100, 110, 120, 130, 140, 150, 160]);
}

#[test]
fn limit_count_formula_holds() {
    let db = test_db();
    let oid = create_test_table(&db);
    for (offset, count, expected) in
        [(0u64, 64u64, 64usize), (0, 100, 64), (60, 10, 4), (64, 5, 0), (0, 0, 0)]
    {
        let rows = run(&db, limit(scan(oid, None, vec![0]), offset, count), &[]);
        assert_eq!(rows.len(), expected, "offset={offset} limit={count}");
    }
}

#[test]
fn nulls_sort_last_ascending_first_descending() {
    let db = test_db();
    let oid = create_test_table(&db);
    let table = db.storage().table(oid).unwrap();
    let txn = db.begin();
    table
        .insert(
            &txn,
            vec![
                Value::integer(9999),
                Value::null(LogicalType::Integer),
                Value::decimal(0.0),
                Value::varchar("null-b"),
            ],
        )
        .unwrap();
    db.commit(&txn).unwrap();

    let asc = run(&db, order_by(scan(oid, None, vec![0, 1]), vec![(1, false)]), &[]);
    assert!(asc.last().unwrap()[1].is_null());
    let desc = run(&db, order_by(scan(oid, None, vec![0, 1]), vec![(1, true)]), &[]);
    assert!(desc.first().unwrap()[1].is_null());
}

#[test]
fn parallel_consumer_counts_sorted_rows() {
    let db = test_db();
    let oid = create_test_table(&db);
    let plan = Arc::new(limit(order_by(scan(oid, None, vec![0, 1]), vec![(0, false)]), 0, 20));
    let txn = db.begin();
    let mut counter = CountingConsumer::new();
    db.execute(&plan, &txn, &[], &mut counter, None).unwrap();
    assert_eq!(counter.count(), 20);
    db.commit(&txn).unwrap();

    // The same cached plan must produce identical results serially.
    let rows = run(&db, limit(order_by(scan(oid, None, vec![0, 1]), vec![(0, false)]), 0, 20), &[]);
    assert_eq!(rows.len(), 20);
    assert_eq!(ints(&rows, 0), (0..20).map(|i| 10 * i).collect::<Vec<i64>>());
}
