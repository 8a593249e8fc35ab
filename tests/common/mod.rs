// Shared fixtures for the engine integration tests: a small-tile-group
// database, the canonical 64-row test table, and plan-building shorthand.

#![allow(dead_code)]

use std::sync::Arc;

use fusedb::catalog::{Column, Schema};
use fusedb::execution::BufferingConsumer;
use fusedb::plan::{
    AggregateKind, AggregatePlan, AggregateStrategy, AggregateTerm, Expression, HashJoinPlan,
    JoinType, LimitPlan, OrderByPlan, PlanNode, SeqScanPlan,
};
use fusedb::types::{ArithOp, CmpOp, LogicalType, Value};
use fusedb::{Database, EngineConfig};

pub const TEST_ROWS: i32 = 64;

/// Small tile groups and batches so multi-group and multi-batch paths get
/// exercised even by the 64-row fixture.
pub fn test_db() -> Database {
    Database::new(EngineConfig {
        worker_threads: 2,
        batch_size: 16,
        tile_group_capacity: 10,
        query_cache_capacity: 64,
        enable_zone_maps: true,
    })
}

/// Table t(a int not null, b int, c decimal, d varchar) with 64 rows
/// (10i, 10i+1, 10i+2, str(10i+3)).
pub fn create_test_table(db: &Database) -> u32 {
    let table = db
        .create_table(
            "t",
            Schema::new(vec![
                Column::new("a", LogicalType::Integer).not_null(),
                Column::new("b", LogicalType::Integer),
                Column::new("c", LogicalType::Decimal),
                Column::new("d", LogicalType::Varchar),
            ]),
        )
        .unwrap();
    let txn = db.begin();
    for i in 0..TEST_ROWS {
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
    table.oid()
}

pub fn col(idx: usize) -> Expression {
    Expression::column(0, idx)
}

pub fn int(v: i32) -> Expression {
    Expression::constant(Value::integer(v))
}

pub fn cmp(op: CmpOp, left: Expression, right: Expression) -> Expression {
    Expression::compare(op, left, right)
}

pub fn add(left: Expression, right: Expression) -> Expression {
    Expression::arithmetic(ArithOp::Add, left, right)
}

pub fn scan(oid: u32, predicate: Option<Expression>, columns: Vec<usize>) -> PlanNode {
    PlanNode::SeqScan(SeqScanPlan { table_oid: oid, predicate, column_ids: columns })
}

pub fn order_by(child: PlanNode, keys: Vec<(usize, bool)>) -> PlanNode {
    PlanNode::OrderBy(OrderByPlan { child: Box::new(child), sort_keys: keys })
}

pub fn limit(child: PlanNode, offset: u64, count: u64) -> PlanNode {
    PlanNode::Limit(LimitPlan { child: Box::new(child), offset, limit: count })
}

pub fn term(kind: AggregateKind, input: Option<Expression>) -> AggregateTerm {
    AggregateTerm { kind, input, distinct: false }
}

pub fn global_agg(child: PlanNode, terms: Vec<AggregateTerm>) -> PlanNode {
    PlanNode::Aggregate(AggregatePlan {
        child: Box::new(child),
        strategy: AggregateStrategy::Plain,
        group_by: Vec::new(),
        terms,
        having: None,
    })
}

pub fn hash_agg(
    child: PlanNode,
    group_by: Vec<usize>,
    terms: Vec<AggregateTerm>,
    having: Option<Expression>,
) -> PlanNode {
    PlanNode::Aggregate(AggregatePlan {
        child: Box::new(child),
        strategy: AggregateStrategy::Hash,
        group_by,
        terms,
        having,
    })
}

pub fn inner_hash_join(
    left: PlanNode,
    right: PlanNode,
    key_cols: (usize, usize),
    output: Vec<(usize, usize)>,
) -> PlanNode {
    PlanNode::HashJoin(HashJoinPlan {
        left: Box::new(left),
        right: Box::new(right),
        join_type: JoinType::Inner,
        left_keys: vec![Expression::column(0, key_cols.0)],
        right_keys: vec![Expression::column(0, key_cols.1)],
        predicate: None,
        output,
    })
}

/// Execute a plan in a fresh transaction and return the buffered tuples.
pub fn run(db: &Database, plan: PlanNode, params: &[Value]) -> Vec<Vec<Value>> {
    let plan = Arc::new(plan);
    let txn = db.begin();
    let mut consumer = BufferingConsumer::new();
    db.execute(&plan, &txn, params, &mut consumer, None).unwrap();
    db.commit(&txn).unwrap();
    consumer.into_tuples()
}

pub fn ints(tuples: &[Vec<Value>], column: usize) -> Vec<i64> {
    tuples.iter().map(|t| t[column].as_i64().unwrap()).collect()
}
