// Expression semantics through compiled projections: arithmetic with
// promotion, CASE, LIKE, IN, CAST, unary minus, scalar functions, and
// three-valued logic end to end.

mod common;

use common::*;
use fusedb::plan::{
    BuiltinFunction, CaseClause, Expression, PlanNode, ProjectionPlan,
};
use fusedb::types::{ArithOp, CmpOp, LogicalType, Value};
use fusedb::DbError;
use std::sync::Arc;

fn project(child: PlanNode, targets: Vec<(usize, Expression)>) -> PlanNode {
    PlanNode::Projection(ProjectionPlan {
        child: Box::new(child),
        target_list: targets,
        direct_map_list: Vec::new(),
    })
}

#[test]
fn arithmetic_promotes_int_and_decimal() {
    let db = test_db();
    let oid = create_test_table(&db);
    // a + c: INTEGER + DECIMAL -> DECIMAL
    let plan = project(
        scan(oid, Some(cmp(CmpOp::Eq, col(0), int(10))), vec![0, 2]),
        vec![(0, add(col(0), Expression::column(0, 1)))],
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::decimal(22.0));
}

#[test]
fn unary_minus_and_modulo() {
    let db = test_db();
    let oid = create_test_table(&db);
    let plan = project(
        scan(oid, Some(cmp(CmpOp::Eq, col(0), int(30))), vec![0]),
        vec![
            (0, Expression::Negate(Box::new(col(0)))),
            (1, Expression::arithmetic(ArithOp::Mod, col(0), int(7))),
        ],
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows[0][0], Value::integer(-30));
    assert_eq!(rows[0][1], Value::integer(2));
}

#[test]
fn case_expression_takes_first_true_branch() {
    let db = test_db();
    let oid = create_test_table(&db);
    let case = Expression::Case {
        clauses: vec![
            CaseClause {
                when: cmp(CmpOp::Lt, col(0), int(100)),
                then: Expression::constant(Value::varchar("small")),
            },
            CaseClause {
                when: cmp(CmpOp::Lt, col(0), int(400)),
                then: Expression::constant(Value::varchar("medium")),
            },
        ],
        default: Some(Box::new(Expression::constant(Value::varchar("large")))),
    };
    let plan = project(scan(oid, None, vec![0]), vec![(0, case)]);
    let rows = run(&db, plan, &[]);
    assert_eq!(rows[0][0], Value::varchar("small"));
    assert_eq!(rows[20][0], Value::varchar("medium"));
    assert_eq!(rows[63][0], Value::varchar("large"));
}

#[test]
fn case_without_default_yields_null() {
    let db = test_db();
    let oid = create_test_table(&db);
    let case = Expression::Case {
        clauses: vec![CaseClause {
            when: cmp(CmpOp::Lt, col(0), int(0)),
            then: int(1),
        }],
        default: None,
    };
    let plan = project(scan(oid, Some(cmp(CmpOp::Eq, col(0), int(0))), vec![0]), vec![(0, case)]);
    let rows = run(&db, plan, &[]);
    assert!(rows[0][0].is_null());
}

#[test]
fn like_matches_patterns() {
    let db = test_db();
    let oid = create_test_table(&db);
    // Scan predicates bind against the full table schema; column 3 is d,
    // the varchar rendering of 10i + 3.
    let like = Expression::Like {
        input: Box::new(Expression::column(0, 3)),
        pattern: Box::new(Expression::constant(Value::varchar("2_3"))),
    };
    let plan = scan(oid, Some(like), vec![3]);
    let rows = run(
        &db,
        PlanNode::Projection(ProjectionPlan {
            child: Box::new(plan),
            target_list: Vec::new(),
            direct_map_list: vec![(0, (0, 0))],
        }),
        &[],
    );
    // d values 203..=293 by tens: 203, 213, ..., 293
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0][0], Value::varchar("203"));
}

#[test]
fn in_list_uses_three_valued_logic() {
    let db = test_db();
    let oid = create_test_table(&db);
    let in_list = Expression::InList {
        needle: Box::new(col(0)),
        list: vec![int(0), int(100), int(9999)],
    };
    let rows = run(&db, scan(oid, Some(in_list), vec![0]), &[]);
    assert_eq!(ints(&rows, 0), vec![0, 100]);

    // A NULL element makes non-matches NULL, never TRUE.
    let with_null = Expression::InList {
        needle: Box::new(col(0)),
        list: vec![int(100), Expression::constant(Value::null(LogicalType::Integer))],
    };
    let rows = run(&db, scan(oid, Some(with_null), vec![0]), &[]);
    assert_eq!(ints(&rows, 0), vec![100]);
}

#[test]
fn cast_between_types() {
    let db = test_db();
    let oid = create_test_table(&db);
    let plan = project(
        scan(oid, Some(cmp(CmpOp::Eq, col(0), int(50))), vec![0, 3]),
        vec![
            (0, Expression::Cast { child: Box::new(col(0)), to: LogicalType::Varchar }),
            (1, Expression::Cast { child: Box::new(Expression::column(0, 1)), to: LogicalType::Integer }),
            (2, Expression::Cast { child: Box::new(col(0)), to: LogicalType::Decimal }),
        ],
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows[0][0], Value::varchar("50"));
    assert_eq!(rows[0][1], Value::integer(53));
    assert_eq!(rows[0][2], Value::decimal(50.0));
}

#[test]
fn out_of_range_cast_fails() {
    let db = test_db();
    let oid = create_test_table(&db);
    let plan = Arc::new(project(
        scan(oid, None, vec![0]),
        vec![(0, Expression::Cast { child: Box::new(col(0)), to: LogicalType::TinyInt })],
    ));
    let txn = db.begin();
    let mut consumer = fusedb::execution::BufferingConsumer::new();
    let err = db.execute(&plan, &txn, &[], &mut consumer, None).unwrap_err();
    assert!(matches!(err, DbError::TypeError(_)));
    db.commit(&txn).unwrap();
}

#[test]
fn scalar_functions_evaluate() {
    let db = test_db();
    let oid = create_test_table(&db);
    let plan = project(
        scan(oid, Some(cmp(CmpOp::Eq, col(0), int(0))), vec![0, 3]),
        vec![
            (0, Expression::FunctionCall {
                function: BuiltinFunction::Length,
                args: vec![Expression::column(0, 1)],
            }),
            (1, Expression::FunctionCall {
                function: BuiltinFunction::Upper,
                args: vec![Expression::constant(Value::varchar("abc"))],
            }),
            (2, Expression::FunctionCall {
                function: BuiltinFunction::Sqrt,
                args: vec![Expression::constant(Value::decimal(16.0))],
            }),
            (3, Expression::FunctionCall {
                function: BuiltinFunction::Abs,
                args: vec![Expression::Negate(Box::new(col(0)))],
            }),
        ],
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows[0][0], Value::integer(1));
    assert_eq!(rows[0][1], Value::varchar("ABC"));
    assert_eq!(rows[0][2], Value::decimal(4.0));
    assert_eq!(rows[0][3], Value::integer(0));
}

#[test]
fn not_and_or_follow_three_valued_logic() {
    let db = test_db();
    let oid = create_test_table(&db);
    // NOT (a < 100) keeps the complement.
    let plan = scan(oid, Some(Expression::Not(Box::new(cmp(CmpOp::Lt, col(0), int(100))))), vec![0]);
    assert_eq!(run(&db, plan, &[]).len(), 54);

    // a < 100 OR a >= 600
    let either = Expression::or(cmp(CmpOp::Lt, col(0), int(100)), cmp(CmpOp::Ge, col(0), int(600)));
    assert_eq!(run(&db, scan(oid, Some(either), vec![0]), &[]).len(), 14);
}
