// Hash join and nested-loop join: inner equi-join shape, probe-side
// ordering, duplicate build keys, NULL join keys, residual predicates, and
// the unsupported-join-type refusal.

mod common;

use common::*;
use fusedb::catalog::{Column, Schema};
use fusedb::execution::BufferingConsumer;
use fusedb::plan::{
    Expression, HashJoinPlan, HashPlan, JoinType, NestedLoopJoinPlan, PlanNode,
};
use fusedb::types::{CmpOp, LogicalType, Value};
use fusedb::{Database, DbError};
use std::sync::Arc;

/// L(a, b) with 20 rows, R(a, b, c) with 80 rows; L.a = R.a matches one
/// row apiece.
fn join_tables(db: &Database) -> (u32, u32) {
    let left = db
        .create_table(
            "l",
            Schema::new(vec![
                Column::new("a", LogicalType::Integer).not_null(),
                Column::new("b", LogicalType::Integer),
            ]),
        )
        .unwrap();
    let right = db
        .create_table(
            "r",
            Schema::new(vec![
                Column::new("a", LogicalType::Integer).not_null(),
                Column::new("b", LogicalType::Integer),
                Column::new("c", LogicalType::Integer),
            ]),
        )
        .unwrap();
    let txn = db.begin();
    for i in 0..20 {
        left.insert(&txn, vec![Value::integer(i), Value::integer(100 + i)]).unwrap();
    }
    for i in 0..80 {
        right
            .insert(&txn, vec![Value::integer(i), Value::integer(200 + i), Value::integer(300 + i)])
            .unwrap();
    }
    db.commit(&txn).unwrap();
    (left.oid(), right.oid())
}

#[test]
fn inner_equi_join_follows_probe_order() {
    let db = test_db();
    let (l, r) = join_tables(&db);
    // SELECT L.a, R.a, L.b, R.c FROM L JOIN R ON L.a = R.a
    let plan = inner_hash_join(
        scan(l, None, vec![0, 1]),
        scan(r, None, vec![0, 1, 2]),
        (0, 0),
        vec![(0, 0), (1, 0), (0, 1), (1, 2)],
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 20);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row[0], row[1], "join key columns must agree");
        // Probe (left) side order is preserved.
        assert_eq!(row[0], Value::integer(i as i32));
        assert_eq!(row[2], Value::integer(100 + i as i32));
        assert_eq!(row[3], Value::integer(300 + i as i32));
    }
}

#[test]
fn build_side_may_be_an_explicit_hash_plan() {
    let db = test_db();
    let (l, r) = join_tables(&db);
    let plan = PlanNode::HashJoin(HashJoinPlan {
        left: Box::new(scan(l, None, vec![0, 1])),
        right: Box::new(PlanNode::Hash(HashPlan {
            child: Box::new(scan(r, None, vec![0, 1, 2])),
            keys: vec![Expression::column(0, 0)],
        })),
        join_type: JoinType::Inner,
        left_keys: vec![Expression::column(0, 0)],
        right_keys: vec![Expression::column(0, 0)],
        predicate: None,
        output: vec![(0, 0), (1, 2)],
    });
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 20);
}

#[test]
fn duplicate_build_keys_multiply_matches() {
    let db = test_db();
    let (l, r) = join_tables(&db);
    // Insert three extra right rows with a = 5.
    let table = db.storage().table(r).unwrap();
    let txn = db.begin();
    for extra in 0..3 {
        table
            .insert(&txn, vec![Value::integer(5), Value::integer(900 + extra), Value::integer(0)])
            .unwrap();
    }
    db.commit(&txn).unwrap();

    let plan = inner_hash_join(
        scan(l, None, vec![0, 1]),
        scan(r, None, vec![0, 1, 2]),
        (0, 0),
        vec![(0, 0), (1, 1)],
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 23);
    assert_eq!(rows.iter().filter(|row| row[0] == Value::integer(5)).count(), 4);
}

#[test]
fn null_keys_never_match() {
    let db = test_db();
    let left = db
        .create_table(
            "ln",
            Schema::new(vec![Column::new("k", LogicalType::Integer)]),
        )
        .unwrap();
    let right = db
        .create_table(
            "rn",
            Schema::new(vec![Column::new("k", LogicalType::Integer)]),
        )
        .unwrap();
    let txn = db.begin();
    left.insert(&txn, vec![Value::null(LogicalType::Integer)]).unwrap();
    left.insert(&txn, vec![Value::integer(1)]).unwrap();
    right.insert(&txn, vec![Value::null(LogicalType::Integer)]).unwrap();
    right.insert(&txn, vec![Value::integer(1)]).unwrap();
    db.commit(&txn).unwrap();

    let plan = inner_hash_join(
        scan(left.oid(), None, vec![0]),
        scan(right.oid(), None, vec![0]),
        (0, 0),
        vec![(0, 0), (1, 0)],
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::integer(1));
}

#[test]
fn residual_predicate_filters_matches() {
    let db = test_db();
    let (l, r) = join_tables(&db);
    // ON L.a = R.a AND R.c >= 310
    let plan = PlanNode::HashJoin(HashJoinPlan {
        left: Box::new(scan(l, None, vec![0, 1])),
        right: Box::new(scan(r, None, vec![0, 1, 2])),
        join_type: JoinType::Inner,
        left_keys: vec![Expression::column(0, 0)],
        right_keys: vec![Expression::column(0, 0)],
        predicate: Some(Expression::compare(
            CmpOp::Ge,
            Expression::column(1, 2),
            int(310),
        )),
        output: vec![(0, 0), (1, 2)],
    });
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0][1], Value::integer(310));
}

#[test]
fn nested_loop_join_supports_arbitrary_predicates() {
    let db = test_db();
    let (l, r) = join_tables(&db);
    // Same equi-join expressed as a general predicate, no hash keys.
    let plan = PlanNode::NestedLoopJoin(NestedLoopJoinPlan {
        left: Box::new(scan(l, None, vec![0, 1])),
        right: Box::new(scan(r, None, vec![0, 1])),
        join_type: JoinType::Inner,
        predicate: Some(Expression::compare(
            CmpOp::Eq,
            Expression::column(0, 0),
            Expression::column(1, 0),
        )),
        output: vec![(0, 0), (1, 1)],
    });
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 20);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row[0], Value::integer(i as i32));
        assert_eq!(row[1], Value::integer(200 + i as i32));
    }
}

#[test]
fn non_inner_joins_are_refused() {
    let db = test_db();
    let (l, r) = join_tables(&db);
    let plan = Arc::new(PlanNode::HashJoin(HashJoinPlan {
        left: Box::new(scan(l, None, vec![0])),
        right: Box::new(scan(r, None, vec![0])),
        join_type: JoinType::Left,
        left_keys: vec![Expression::column(0, 0)],
        right_keys: vec![Expression::column(0, 0)],
        predicate: None,
        output: vec![(0, 0)],
    }));
    let txn = db.begin();
    let mut consumer = BufferingConsumer::new();
    let err = db.execute(&plan, &txn, &[], &mut consumer, None).unwrap_err();
    assert!(matches!(err, DbError::UnsupportedPlan(_)));
    db.commit(&txn).unwrap();
}
