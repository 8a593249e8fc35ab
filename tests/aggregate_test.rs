// Aggregation: global and grouped, HAVING, WHERE-before-GROUP-BY, DISTINCT
// modifiers, and aggregate semantics over empty and NULL-bearing input.

mod common;

use common::*;
use fusedb::plan::{AggregateKind, AggregateTerm, Expression};
use fusedb::types::{CmpOp, LogicalType, Value};

#[test]
fn count_star_over_table() {
    let db = test_db();
    let oid = create_test_table(&db);
    let plan = global_agg(scan(oid, None, vec![0]), vec![term(AggregateKind::CountStar, None)]);
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::bigint(64));
}

#[test]
fn global_max_and_min() {
    let db = test_db();
    let oid = create_test_table(&db);
    let plan = global_agg(
        scan(oid, None, vec![0, 1]),
        vec![
            term(AggregateKind::Max, Some(col(0))),
            term(AggregateKind::Min, Some(col(1))),
        ],
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::integer(630));
    assert_eq!(rows[0][1], Value::integer(1));
}

#[test]
fn group_by_unique_key_yields_singleton_groups() {
    let db = test_db();
    let oid = create_test_table(&db);
    let plan = hash_agg(
        scan(oid, None, vec![0, 1]),
        vec![0],
        vec![term(AggregateKind::CountStar, None)],
        None,
    );
    let mut rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 64);
    rows.sort_by_key(|r| r[0].as_i64());
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row[0], Value::integer(10 * i as i32));
        assert_eq!(row[1], Value::bigint(1));
    }
}

#[test]
fn having_filters_groups() {
    let db = test_db();
    let oid = create_test_table(&db);
    // SELECT a, avg(b) x FROM t GROUP BY a HAVING x > 50
    let having = Expression::compare(
        CmpOp::Gt,
        Expression::AggregateRef { term_idx: 0 },
        int(50),
    );
    let plan = hash_agg(
        scan(oid, None, vec![0, 1]),
        vec![0],
        vec![term(AggregateKind::Avg, Some(col(1)))],
        Some(having),
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 59);
}

#[test]
fn where_applies_before_grouping() {
    let db = test_db();
    let oid = create_test_table(&db);
    // SELECT a, avg(b) FROM t WHERE a > 50 GROUP BY a
    let plan = hash_agg(
        scan(oid, Some(cmp(CmpOp::Gt, col(0), int(50))), vec![0, 1]),
        vec![0],
        vec![term(AggregateKind::Avg, Some(col(1)))],
        None,
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 58);
}

#[test]
fn sum_and_avg_over_decimal_column() {
    let db = test_db();
    let oid = create_test_table(&db);
    let plan = global_agg(
        scan(oid, None, vec![2]),
        vec![
            term(AggregateKind::Sum, Some(col(0))),
            term(AggregateKind::Avg, Some(col(0))),
        ],
    );
    let rows = run(&db, plan, &[]);
    // c = 10i + 2 for i in 0..64: sum = 10 * 2016 + 128
    assert_eq!(rows[0][0], Value::decimal(20288.0));
    assert_eq!(rows[0][1], Value::decimal(20288.0 / 64.0));
}

#[test]
fn aggregates_over_empty_input() {
    let db = test_db();
    let oid = create_test_table(&db);
    let none = scan(oid, Some(cmp(CmpOp::Lt, col(0), int(0))), vec![0, 1]);
    let plan = global_agg(
        none,
        vec![
            term(AggregateKind::CountStar, None),
            term(AggregateKind::Count, Some(col(0))),
            term(AggregateKind::Sum, Some(col(0))),
            term(AggregateKind::Min, Some(col(0))),
            term(AggregateKind::Avg, Some(col(1))),
        ],
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::bigint(0));
    assert_eq!(rows[0][1], Value::bigint(0));
    assert!(rows[0][2].is_null());
    assert!(rows[0][3].is_null());
    assert!(rows[0][4].is_null());
}

#[test]
fn null_inputs_are_skipped() {
    let db = test_db();
    let oid = create_test_table(&db);
    let table = db.storage().table(oid).unwrap();
    let txn = db.begin();
    for _ in 0..3 {
        table
            .insert(
                &txn,
                vec![
                    Value::integer(5000),
                    Value::null(LogicalType::Integer),
                    Value::decimal(0.0),
                    Value::varchar("n"),
                ],
            )
            .unwrap();
    }
    db.commit(&txn).unwrap();

    let plan = global_agg(
        scan(oid, None, vec![1]),
        vec![
            term(AggregateKind::Count, Some(col(0))),
            term(AggregateKind::CountStar, None),
            term(AggregateKind::Sum, Some(col(0))),
        ],
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows[0][0], Value::bigint(64));
    assert_eq!(rows[0][1], Value::bigint(67));
    // sum(b) over the 64 non-NULL rows: sum(10i + 1) = 20160 + 64
    assert_eq!(rows[0][2], Value::bigint(20224));
}

#[test]
fn distinct_aggregates_deduplicate() {
    let db = test_db();
    let oid = create_test_table(&db);
    let table = db.storage().table(oid).unwrap();
    // Duplicate the first ten rows so plain COUNT and DISTINCT diverge.
    let txn = db.begin();
    for i in 0..10 {
        table
            .insert(
                &txn,
                vec![
                    Value::integer(10 * i),
                    Value::integer(10 * i + 1),
                    Value::decimal(f64::from(10 * i + 2)),
                    Value::varchar(format!("{}", 10 * i + 3)),
                ],
            )
            .unwrap();
    }
    db.commit(&txn).unwrap();

    let plan = global_agg(
        scan(oid, None, vec![0]),
        vec![
            term(AggregateKind::Count, Some(col(0))),
            AggregateTerm { kind: AggregateKind::Count, input: Some(col(0)), distinct: true },
            AggregateTerm { kind: AggregateKind::Sum, input: Some(col(0)), distinct: true },
        ],
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows[0][0], Value::bigint(74));
    assert_eq!(rows[0][1], Value::bigint(64));
    // sum of distinct a = sum(10i) for i in 0..64
    assert_eq!(rows[0][2], Value::bigint(20160));
}

#[test]
fn grouped_distinct_counts() {
    let db = test_db();
    let table = db
        .create_table(
            "dup",
            fusedb::catalog::Schema::new(vec![
                fusedb::catalog::Column::new("g", LogicalType::Integer).not_null(),
                fusedb::catalog::Column::new("v", LogicalType::Integer),
            ]),
        )
        .unwrap();
    let txn = db.begin();
    for i in 0..100 {
        table
            .insert(&txn, vec![Value::integer(i % 4), Value::integer(i % 10)])
            .unwrap();
    }
    db.commit(&txn).unwrap();

    let plan = hash_agg(
        scan(table.oid(), None, vec![0, 1]),
        vec![0],
        vec![AggregateTerm { kind: AggregateKind::Count, input: Some(col(1)), distinct: true }],
        None,
    );
    let mut rows = run(&db, plan, &[]);
    rows.sort_by_key(|r| r[0].as_i64());
    assert_eq!(rows.len(), 4);
    for row in rows {
        // Each residue class of 4 hits exactly 5 residues mod 10.
        assert_eq!(row[1], Value::bigint(5));
    }
}
