// Deep structural comparison and hashing over plan and expression trees.
// compare() is a total three-way order: nodes of different kinds order by
// their integer kind tag, nodes of the same kind compare field by field and
// then children pairwise. hash_plan() is kept in lockstep so that equal
// plans always hash equally; the query cache relies on both.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::expression::{CaseClause, Expression};
use super::PlanNode;
use crate::types::compare::compare_for_sort;
use crate::types::Value;

pub fn compare(a: &PlanNode, b: &PlanNode) -> Ordering {
    let by_kind = a.kind_tag().cmp(&b.kind_tag());
    if by_kind != Ordering::Equal {
        return by_kind;
    }
    let by_payload = compare_payload(a, b);
    if by_payload != Ordering::Equal {
        return by_payload;
    }
    compare_children(a, b)
}

pub fn equal(a: &PlanNode, b: &PlanNode) -> bool {
    compare(a, b) == Ordering::Equal
}

fn compare_children(a: &PlanNode, b: &PlanNode) -> Ordering {
    let ca = a.children();
    let cb = b.children();
    for (x, y) in ca.iter().zip(&cb) {
        match compare(x, y) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    ca.len().cmp(&cb.len())
}

fn compare_payload(a: &PlanNode, b: &PlanNode) -> Ordering {
    use PlanNode::*;
    match (a, b) {
        (SeqScan(x), SeqScan(y)) => x
            .table_oid
            .cmp(&y.table_oid)
            .then_with(|| compare_opt_expr(&x.predicate, &y.predicate))
            .then_with(|| x.column_ids.cmp(&y.column_ids)),
        (IndexScan(x), IndexScan(y)) => x
            .table_oid
            .cmp(&y.table_oid)
            .then_with(|| x.index_oid.cmp(&y.index_oid))
            .then_with(|| x.column_ids.cmp(&y.column_ids))
            .then_with(|| compare_expr_list(&x.eq_keys, &y.eq_keys))
            .then_with(|| compare_opt_bound(&x.low, &y.low))
            .then_with(|| compare_opt_bound(&x.high, &y.high))
            .then_with(|| compare_opt_expr(&x.predicate, &y.predicate)),
        (Projection(x), Projection(y)) => {
            let targets = || {
                for ((ci, ei), (cj, ej)) in x.target_list.iter().zip(&y.target_list) {
                    let ord = ci.cmp(cj).then_with(|| compare_expr(ei, ej));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                x.target_list.len().cmp(&y.target_list.len())
            };
            targets().then_with(|| x.direct_map_list.cmp(&y.direct_map_list))
        }
        (Limit(x), Limit(y)) => x.offset.cmp(&y.offset).then_with(|| x.limit.cmp(&y.limit)),
        (OrderBy(x), OrderBy(y)) => x.sort_keys.cmp(&y.sort_keys),
        (Aggregate(x), Aggregate(y)) => x
            .strategy
            .cmp(&y.strategy)
            .then_with(|| x.group_by.cmp(&y.group_by))
            .then_with(|| {
                for (ti, tj) in x.terms.iter().zip(&y.terms) {
                    let ord = ti
                        .kind
                        .cmp(&tj.kind)
                        .then_with(|| ti.distinct.cmp(&tj.distinct))
                        .then_with(|| compare_opt_expr(&ti.input, &tj.input));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                x.terms.len().cmp(&y.terms.len())
            })
            .then_with(|| compare_opt_expr(&x.having, &y.having)),
        (Hash(x), Hash(y)) => compare_expr_list(&x.keys, &y.keys),
        (HashJoin(x), HashJoin(y)) => x
            .join_type
            .cmp(&y.join_type)
            .then_with(|| compare_expr_list(&x.left_keys, &y.left_keys))
            .then_with(|| compare_expr_list(&x.right_keys, &y.right_keys))
            .then_with(|| compare_opt_expr(&x.predicate, &y.predicate))
            .then_with(|| x.output.cmp(&y.output)),
        (NestedLoopJoin(x), NestedLoopJoin(y)) => x
            .join_type
            .cmp(&y.join_type)
            .then_with(|| compare_opt_expr(&x.predicate, &y.predicate))
            .then_with(|| x.output.cmp(&y.output)),
        (Insert(x), Insert(y)) => x.table_oid.cmp(&y.table_oid).then_with(|| {
            for (ri, rj) in x.tuples.iter().zip(&y.tuples) {
                let ord = compare_expr_list(ri, rj);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.tuples.len().cmp(&y.tuples.len())
        }),
        (Update(x), Update(y)) => x.table_oid.cmp(&y.table_oid).then_with(|| {
            for ((ci, ei), (cj, ej)) in x.target_list.iter().zip(&y.target_list) {
                let ord = ci.cmp(cj).then_with(|| compare_expr(ei, ej));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.target_list.len().cmp(&y.target_list.len())
        }),
        (Delete(x), Delete(y)) => x.table_oid.cmp(&y.table_oid),
        (CsvScan(x), CsvScan(y)) => x
            .path
            .cmp(&y.path)
            .then_with(|| x.column_types.cmp(&y.column_types))
            .then_with(|| x.delimiter.cmp(&y.delimiter))
            .then_with(|| x.quote.cmp(&y.quote))
            .then_with(|| x.escape.cmp(&y.escape)),
        (ExportExternalFile(x), ExportExternalFile(y)) => x
            .path
            .cmp(&y.path)
            .then_with(|| x.delimiter.cmp(&y.delimiter))
            .then_with(|| x.quote.cmp(&y.quote))
            .then_with(|| x.escape.cmp(&y.escape)),
        _ => unreachable!("kind tags already matched"),
    }
}

fn compare_opt_expr(a: &Option<Expression>, b: &Option<Expression>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_expr(x, y),
    }
}

fn compare_opt_bound(
    a: &Option<(crate::types::CmpOp, Expression)>,
    b: &Option<(crate::types::CmpOp, Expression)>,
) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some((oa, ea)), Some((ob, eb))) => oa.cmp(ob).then_with(|| compare_expr(ea, eb)),
    }
}

fn compare_expr_list(a: &[Expression], b: &[Expression]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match compare_expr(x, y) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    a.len().cmp(&b.len())
}

fn compare_value(a: &Value, b: &Value) -> Ordering {
    // Type-sensitive first: INTEGER 1 and BIGINT 1 are different constants.
    a.ty().cmp(&b.ty()).then_with(|| compare_for_sort(a, b))
}

pub fn compare_expr(a: &Expression, b: &Expression) -> Ordering {
    let by_kind = a.kind_tag().cmp(&b.kind_tag());
    if by_kind != Ordering::Equal {
        return by_kind;
    }
    use Expression::*;
    match (a, b) {
        (Constant(x), Constant(y)) => compare_value(x, y),
        (
            ColumnRef { tuple_idx: ta, column_idx: ca },
            ColumnRef { tuple_idx: tb, column_idx: cb },
        ) => ta.cmp(tb).then_with(|| ca.cmp(cb)),
        (Arithmetic { op: oa, .. }, Arithmetic { op: ob, .. }) if oa != ob => oa.cmp(ob),
        (Arithmetic { .. }, Arithmetic { .. }) => compare_expr_children(a, b),
        (Compare { op: oa, .. }, Compare { op: ob, .. }) if oa != ob => oa.cmp(ob),
        (Compare { .. }, Compare { .. }) => compare_expr_children(a, b),
        (Like { .. }, Like { .. }) => compare_expr_children(a, b),
        (InList { .. }, InList { .. }) => compare_expr_children(a, b),
        (Logical { op: oa, .. }, Logical { op: ob, .. }) if oa != ob => oa.cmp(ob),
        (Logical { .. }, Logical { .. }) => compare_expr_children(a, b),
        (Not(_), Not(_)) | (Negate(_), Negate(_)) => compare_expr_children(a, b),
        (Cast { to: ta, .. }, Cast { to: tb, .. }) if ta != tb => ta.cmp(tb),
        (Cast { .. }, Cast { .. }) => compare_expr_children(a, b),
        (Case { clauses: ca, default: da }, Case { clauses: cb, default: db }) => {
            for (CaseClause { when: wa, then: ta }, CaseClause { when: wb, then: tb }) in
                ca.iter().zip(cb)
            {
                let ord = compare_expr(wa, wb).then_with(|| compare_expr(ta, tb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            ca.len().cmp(&cb.len()).then_with(|| match (da, db) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => compare_expr(x, y),
            })
        }
        (Parameter { index: ia }, Parameter { index: ib }) => ia.cmp(ib),
        (AggregateRef { term_idx: ia }, AggregateRef { term_idx: ib }) => ia.cmp(ib),
        (FunctionCall { function: fa, .. }, FunctionCall { function: fb, .. }) if fa != fb => {
            fa.cmp(fb)
        }
        (FunctionCall { .. }, FunctionCall { .. }) => compare_expr_children(a, b),
        _ => unreachable!("kind tags already matched"),
    }
}

fn compare_expr_children(a: &Expression, b: &Expression) -> Ordering {
    let ca = a.children();
    let cb = b.children();
    for (x, y) in ca.iter().zip(&cb) {
        match compare_expr(x, y) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    ca.len().cmp(&cb.len())
}

pub fn hash_plan(plan: &PlanNode) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_plan_into(plan, &mut hasher);
    hasher.finish()
}

fn hash_plan_into<H: Hasher>(plan: &PlanNode, h: &mut H) {
    h.write_u8(plan.kind_tag());
    use PlanNode::*;
    match plan {
        SeqScan(p) => {
            h.write_u32(p.table_oid);
            hash_opt_expr(&p.predicate, h);
            p.column_ids.hash(h);
        }
        IndexScan(p) => {
            h.write_u32(p.table_oid);
            h.write_u32(p.index_oid);
            p.column_ids.hash(h);
            hash_expr_list(&p.eq_keys, h);
            for bound in [&p.low, &p.high] {
                match bound {
                    None => h.write_u8(0),
                    Some((op, e)) => {
                        h.write_u8(1);
                        op.hash(h);
                        hash_expr_into(e, h);
                    }
                }
            }
            hash_opt_expr(&p.predicate, h);
        }
        Projection(p) => {
            h.write_usize(p.target_list.len());
            for (col, e) in &p.target_list {
                h.write_usize(*col);
                hash_expr_into(e, h);
            }
            p.direct_map_list.hash(h);
        }
        Limit(p) => {
            h.write_u64(p.offset);
            h.write_u64(p.limit);
        }
        OrderBy(p) => p.sort_keys.hash(h),
        Aggregate(p) => {
            p.strategy.hash(h);
            p.group_by.hash(h);
            h.write_usize(p.terms.len());
            for t in &p.terms {
                t.kind.hash(h);
                t.distinct.hash(h);
                hash_opt_expr(&t.input, h);
            }
            hash_opt_expr(&p.having, h);
        }
        Hash(p) => hash_expr_list(&p.keys, h),
        HashJoin(p) => {
            p.join_type.hash(h);
            hash_expr_list(&p.left_keys, h);
            hash_expr_list(&p.right_keys, h);
            hash_opt_expr(&p.predicate, h);
            p.output.hash(h);
        }
        NestedLoopJoin(p) => {
            p.join_type.hash(h);
            hash_opt_expr(&p.predicate, h);
            p.output.hash(h);
        }
        Insert(p) => {
            h.write_u32(p.table_oid);
            h.write_usize(p.tuples.len());
            for row in &p.tuples {
                hash_expr_list(row, h);
            }
        }
        Update(p) => {
            h.write_u32(p.table_oid);
            h.write_usize(p.target_list.len());
            for (col, e) in &p.target_list {
                h.write_usize(*col);
                hash_expr_into(e, h);
            }
        }
        Delete(p) => h.write_u32(p.table_oid),
        CsvScan(p) => {
            p.path.hash(h);
            p.column_types.hash(h);
            p.delimiter.hash(h);
            p.quote.hash(h);
            p.escape.hash(h);
        }
        ExportExternalFile(p) => {
            p.path.hash(h);
            p.delimiter.hash(h);
            p.quote.hash(h);
            p.escape.hash(h);
        }
    }
    for child in plan.children() {
        hash_plan_into(child, h);
    }
}

fn hash_opt_expr<H: Hasher>(e: &Option<Expression>, h: &mut H) {
    match e {
        None => h.write_u8(0),
        Some(e) => {
            h.write_u8(1);
            hash_expr_into(e, h);
        }
    }
}

fn hash_expr_list<H: Hasher>(list: &[Expression], h: &mut H) {
    h.write_usize(list.len());
    for e in list {
        hash_expr_into(e, h);
    }
}

fn hash_expr_into<H: Hasher>(e: &Expression, h: &mut H) {
    h.write_u8(e.kind_tag());
    use Expression::*;
    match e {
        Constant(v) => {
            v.ty().hash(h);
            v.hash_into(h);
        }
        ColumnRef { tuple_idx, column_idx } => {
            h.write_usize(*tuple_idx);
            h.write_usize(*column_idx);
        }
        Arithmetic { op, .. } => op.hash(h),
        Compare { op, .. } => op.hash(h),
        Like { .. } | InList { .. } | Not(_) | Negate(_) => {}
        Logical { op, .. } => op.hash(h),
        Cast { to, .. } => to.hash(h),
        Case { clauses, default } => {
            h.write_usize(clauses.len());
            h.write_u8(default.is_some() as u8);
        }
        Parameter { index } => h.write_usize(*index),
        AggregateRef { term_idx } => h.write_usize(*term_idx),
        FunctionCall { function, .. } => function.hash(h),
    }
    let children = e.children();
    h.write_usize(children.len());
    for c in children {
        hash_expr_into(c, h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{LimitPlan, OrderByPlan, SeqScanPlan};
    use crate::types::{CmpOp, Value};

    fn scan(oid: u32, with_predicate: bool) -> PlanNode {
        PlanNode::SeqScan(SeqScanPlan {
            table_oid: oid,
            predicate: with_predicate.then(|| {
                Expression::compare(
                    CmpOp::Ge,
                    Expression::column(0, 0),
                    Expression::constant(Value::integer(20)),
                )
            }),
            column_ids: vec![0, 1, 2],
        })
    }

    fn sorted(oid: u32, descending: bool) -> PlanNode {
        PlanNode::OrderBy(OrderByPlan {
            child: Box::new(scan(oid, true)),
            sort_keys: vec![(1, descending)],
        })
    }

    #[test]
    fn identical_trees_compare_equal() {
        assert!(equal(&sorted(7, false), &sorted(7, false)));
        assert_eq!(hash_plan(&sorted(7, false)), hash_plan(&sorted(7, false)));
    }

    #[test]
    fn sort_direction_distinguishes_plans() {
        assert!(!equal(&sorted(7, false), &sorted(7, true)));
    }

    #[test]
    fn predicate_distinguishes_plans() {
        assert!(!equal(&scan(7, true), &scan(7, false)));
        assert!(!equal(&scan(7, true), &scan(8, true)));
    }

    #[test]
    fn constants_are_type_sensitive() {
        let a = PlanNode::SeqScan(SeqScanPlan {
            table_oid: 1,
            predicate: Some(Expression::constant(Value::integer(1))),
            column_ids: vec![0],
        });
        let b = PlanNode::SeqScan(SeqScanPlan {
            table_oid: 1,
            predicate: Some(Expression::constant(Value::bigint(1))),
            column_ids: vec![0],
        });
        assert!(!equal(&a, &b));
    }

    #[test]
    fn compare_is_a_total_order() {
        let plans = vec![
            scan(1, false),
            scan(1, true),
            scan(2, false),
            sorted(1, false),
            sorted(1, true),
            PlanNode::Limit(LimitPlan { child: Box::new(scan(1, false)), offset: 0, limit: 10 }),
        ];
        for a in &plans {
            assert_eq!(compare(a, a), Ordering::Equal);
            for b in &plans {
                assert_eq!(compare(a, b), compare(b, a).reverse());
            }
        }
    }
}
