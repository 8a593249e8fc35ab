// Attribute binding: a top-down walk that assigns every operator's output
// columns a stable attribute handle and checks expression types along the
// way. After binding, translators speak in attribute ids instead of raw
// column positions, which keeps fused pipelines position-independent.

use super::expression::{BuiltinFunction, Expression};
use super::{AggregateKind, PlanNode};
use crate::catalog::Catalog;
use crate::error::{DbError, Result};
use crate::types::{arithmetic, cast, LogicalType};

pub type AttrId = u32;

/// A late-bound handle naming one logical column of an operator's output.
#[derive(Debug, Clone)]
pub struct AttributeInfo {
    pub id: AttrId,
    pub ty: LogicalType,
    pub nullable: bool,
    pub name: String,
}

/// Binding result: per plan node (pre-order id), the output schema plus the
/// node's internal attribute table (scans bind every table column so that
/// predicates can reference non-projected columns).
pub struct BoundPlan {
    outputs: Vec<Vec<AttributeInfo>>,
    internal: Vec<Vec<AttributeInfo>>,
    children_ids: Vec<Vec<usize>>,
    param_types: Vec<LogicalType>,
}

impl BoundPlan {
    pub fn node_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn output(&self, node_id: usize) -> &[AttributeInfo] {
        &self.outputs[node_id]
    }

    pub fn internal(&self, node_id: usize) -> &[AttributeInfo] {
        &self.internal[node_id]
    }

    pub fn children_of(&self, node_id: usize) -> &[usize] {
        &self.children_ids[node_id]
    }

    pub fn param_types(&self) -> &[LogicalType] {
        &self.param_types
    }
}

struct Binder<'a> {
    catalog: &'a Catalog,
    param_types: &'a [LogicalType],
    next_attr: AttrId,
    outputs: Vec<Vec<AttributeInfo>>,
    internal: Vec<Vec<AttributeInfo>>,
    children_ids: Vec<Vec<usize>>,
}

/// Walk the plan and install the column-id to attribute-info mapping for
/// every operator.
pub fn perform_binding(
    root: &PlanNode,
    catalog: &Catalog,
    param_types: &[LogicalType],
) -> Result<BoundPlan> {
    let mut binder = Binder {
        catalog,
        param_types,
        next_attr: 0,
        outputs: Vec::new(),
        internal: Vec::new(),
        children_ids: Vec::new(),
    };
    binder.bind(root)?;
    Ok(BoundPlan {
        outputs: binder.outputs,
        internal: binder.internal,
        children_ids: binder.children_ids,
        param_types: param_types.to_vec(),
    })
}

impl<'a> Binder<'a> {
    fn fresh_attr(&mut self, ty: LogicalType, nullable: bool, name: impl Into<String>) -> AttributeInfo {
        let id = self.next_attr;
        self.next_attr += 1;
        AttributeInfo { id, ty, nullable, name: name.into() }
    }

    fn bind(&mut self, node: &PlanNode) -> Result<usize> {
        let node_id = self.outputs.len();
        self.outputs.push(Vec::new());
        self.internal.push(Vec::new());
        self.children_ids.push(Vec::new());

        let mut child_ids = Vec::new();
        for child in node.children() {
            child_ids.push(self.bind(child)?);
        }
        self.children_ids[node_id] = child_ids.clone();

        let (output, internal) = self.bind_node(node, node_id, &child_ids)?;
        self.outputs[node_id] = output;
        self.internal[node_id] = internal;
        Ok(node_id)
    }

    fn child_output(&self, id: usize) -> &[AttributeInfo] {
        &self.outputs[id]
    }

    fn bind_node(
        &mut self,
        node: &PlanNode,
        _node_id: usize,
        children: &[usize],
    ) -> Result<(Vec<AttributeInfo>, Vec<AttributeInfo>)> {
        match node {
            PlanNode::SeqScan(p) => {
                let table = self.catalog.table(p.table_oid)?;
                let all: Vec<AttributeInfo> = table
                    .schema
                    .columns
                    .iter()
                    .map(|c| self.fresh_attr(c.ty, c.nullable, c.name.clone()))
                    .collect();
                if let Some(pred) = &p.predicate {
                    self.expect_bool(pred, &[&all], None)?;
                }
                let output = project_columns(&all, &p.column_ids)?;
                Ok((output, all))
            }
            PlanNode::IndexScan(p) => {
                let table = self.catalog.table(p.table_oid)?;
                let index = self.catalog.index(p.index_oid)?;
                if index.table_oid != p.table_oid {
                    return Err(DbError::Catalog(format!(
                        "index {} does not belong to table {}",
                        index.name, table.name
                    )));
                }
                if p.eq_keys.len() > index.key_columns.len() {
                    return Err(DbError::InvalidArgument(
                        "more equality keys than index key columns".into(),
                    ));
                }
                let bounded = p.eq_keys.len() + (p.low.is_some() || p.high.is_some()) as usize;
                if bounded > index.key_columns.len() {
                    return Err(DbError::InvalidArgument(
                        "range bound beyond the last index key column".into(),
                    ));
                }
                let all: Vec<AttributeInfo> = table
                    .schema
                    .columns
                    .iter()
                    .map(|c| self.fresh_attr(c.ty, c.nullable, c.name.clone()))
                    .collect();
                for key in &p.eq_keys {
                    self.infer(key, &[&all], None)?;
                }
                for bound in p.low.iter().chain(p.high.iter()) {
                    self.infer(&bound.1, &[&all], None)?;
                }
                if let Some(pred) = &p.predicate {
                    self.expect_bool(pred, &[&all], None)?;
                }
                let output = project_columns(&all, &p.column_ids)?;
                Ok((output, all))
            }
            PlanNode::CsvScan(p) => {
                let output = p
                    .column_types
                    .iter()
                    .enumerate()
                    .map(|(i, &ty)| self.fresh_attr(ty, true, format!("col{i}")))
                    .collect();
                Ok((output, Vec::new()))
            }
            PlanNode::Projection(p) => {
                let child = self.child_output(children[0]).to_vec();
                let arity = p
                    .target_list
                    .iter()
                    .map(|(c, _)| c + 1)
                    .chain(p.direct_map_list.iter().map(|(c, _)| c + 1))
                    .max()
                    .unwrap_or(0);
                let mut slots: Vec<Option<AttributeInfo>> = vec![None; arity];
                for (dest, expr) in &p.target_list {
                    let (ty, nullable) = self.infer(expr, &[&child], None)?;
                    let attr = self.fresh_attr(ty, nullable, format!("expr{dest}"));
                    fill_slot(&mut slots, *dest, attr)?;
                }
                for (dest, (tuple_idx, col)) in &p.direct_map_list {
                    if *tuple_idx != 0 {
                        return Err(DbError::InvalidArgument(
                            "projection direct map references a missing child".into(),
                        ));
                    }
                    let attr = child
                        .get(*col)
                        .ok_or_else(|| column_out_of_range(*col, child.len()))?
                        .clone();
                    fill_slot(&mut slots, *dest, attr)?;
                }
                let output = slots
                    .into_iter()
                    .enumerate()
                    .map(|(i, s)| {
                        s.ok_or_else(|| {
                            DbError::InvalidArgument(format!("projection column {i} is unassigned"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok((output, Vec::new()))
            }
            PlanNode::Limit(_) | PlanNode::Hash(_) => {
                Ok((self.child_output(children[0]).to_vec(), Vec::new()))
            }
            PlanNode::OrderBy(p) => {
                let child = self.child_output(children[0]).to_vec();
                for (col, _) in &p.sort_keys {
                    child.get(*col).ok_or_else(|| column_out_of_range(*col, child.len()))?;
                }
                Ok((child, Vec::new()))
            }
            PlanNode::Aggregate(p) => {
                let child = self.child_output(children[0]).to_vec();
                let mut output = Vec::new();
                for &col in &p.group_by {
                    let src = child.get(col).ok_or_else(|| column_out_of_range(col, child.len()))?;
                    let attr = self.fresh_attr(src.ty, src.nullable, src.name.clone());
                    output.push(attr);
                }
                let mut term_types = Vec::new();
                for (i, term) in p.terms.iter().enumerate() {
                    let input_ty = match (&term.input, term.kind) {
                        (None, AggregateKind::CountStar) => None,
                        (None, _) => {
                            return Err(DbError::InvalidArgument(format!(
                                "aggregate term {i} requires an argument"
                            )))
                        }
                        (Some(e), _) => Some(self.infer(e, &[&child], None)?.0),
                    };
                    let out_ty = aggregate_output_type(term.kind, input_ty)?;
                    term_types.push(out_ty);
                    // Aggregates over empty input are NULL (except COUNT).
                    let nullable =
                        !matches!(term.kind, AggregateKind::Count | AggregateKind::CountStar);
                    let attr = self.fresh_attr(out_ty, nullable, format!("agg{i}"));
                    output.push(attr);
                }
                if let Some(having) = &p.having {
                    self.expect_bool(having, &[&output], Some(&term_types))?;
                }
                Ok((output, Vec::new()))
            }
            PlanNode::HashJoin(p) => {
                let left = self.child_output(children[0]).to_vec();
                let right = self.child_output(children[1]).to_vec();
                if p.left_keys.len() != p.right_keys.len() || p.left_keys.is_empty() {
                    return Err(DbError::InvalidArgument(
                        "hash join requires matching, non-empty key lists".into(),
                    ));
                }
                for (l, r) in p.left_keys.iter().zip(&p.right_keys) {
                    let (lt, _) = self.infer(l, &[&left], None)?;
                    let (rt, _) = self.infer(r, &[&right], None)?;
                    cast::promote_pair(lt, rt)?;
                }
                if let Some(pred) = &p.predicate {
                    self.expect_bool(pred, &[&left, &right], None)?;
                }
                let output = join_output(&p.output, &left, &right)?;
                Ok((output, Vec::new()))
            }
            PlanNode::NestedLoopJoin(p) => {
                let left = self.child_output(children[0]).to_vec();
                let right = self.child_output(children[1]).to_vec();
                if let Some(pred) = &p.predicate {
                    self.expect_bool(pred, &[&left, &right], None)?;
                }
                let output = join_output(&p.output, &left, &right)?;
                Ok((output, Vec::new()))
            }
            PlanNode::Insert(p) => {
                let table = self.catalog.table(p.table_oid)?;
                let arity = table.schema.arity();
                match (&p.child, p.tuples.is_empty()) {
                    (Some(_), false) => {
                        return Err(DbError::InvalidArgument(
                            "insert cannot have both literal tuples and a child plan".into(),
                        ))
                    }
                    (None, true) => {
                        return Err(DbError::InvalidArgument("insert has no input".into()))
                    }
                    (Some(_), true) => {
                        let child = self.child_output(children[0]);
                        if child.len() != arity {
                            return Err(DbError::InvalidArgument(format!(
                                "insert select produces {} columns, table '{}' expects {arity}",
                                child.len(),
                                table.name
                            )));
                        }
                    }
                    (None, false) => {
                        for row in &p.tuples {
                            if row.len() != arity {
                                return Err(DbError::InvalidArgument(format!(
                                    "insert row has {} values, table '{}' expects {arity}",
                                    row.len(),
                                    table.name
                                )));
                            }
                            for expr in row {
                                self.infer(expr, &[], None)?;
                            }
                        }
                    }
                }
                Ok((Vec::new(), Vec::new()))
            }
            PlanNode::Update(p) => {
                let table = self.catalog.table(p.table_oid)?;
                let child = self.child_output(children[0]).to_vec();
                if child.len() != table.schema.arity() {
                    return Err(DbError::InvalidArgument(format!(
                        "update child must produce all {} columns of '{}'",
                        table.schema.arity(),
                        table.name
                    )));
                }
                for (col, expr) in &p.target_list {
                    table.schema.column(*col)?;
                    self.infer(expr, &[&child], None)?;
                }
                Ok((Vec::new(), Vec::new()))
            }
            PlanNode::Delete(_) => Ok((Vec::new(), Vec::new())),
            PlanNode::ExportExternalFile(_) => {
                Ok((self.child_output(children[0]).to_vec(), Vec::new()))
            }
        }
    }

    fn expect_bool(
        &self,
        expr: &Expression,
        inputs: &[&[AttributeInfo]],
        agg_terms: Option<&[LogicalType]>,
    ) -> Result<()> {
        expect_bool(expr, inputs, self.param_types, agg_terms)
    }

    fn infer(
        &self,
        expr: &Expression,
        inputs: &[&[AttributeInfo]],
        agg_terms: Option<&[LogicalType]>,
    ) -> Result<(LogicalType, bool)> {
        infer_expr(expr, inputs, self.param_types, agg_terms)
    }
}

pub(crate) fn expect_bool(
    expr: &Expression,
    inputs: &[&[AttributeInfo]],
    param_types: &[LogicalType],
    agg_terms: Option<&[LogicalType]>,
) -> Result<()> {
    let (ty, _) = infer_expr(expr, inputs, param_types, agg_terms)?;
    if ty != LogicalType::Bool && ty != LogicalType::Null {
        return Err(DbError::TypeError(format!("predicate has type {ty}, expected BOOL")));
    }
    Ok(())
}

/// Infer the (type, nullable) of an expression over the given input
/// schemas. Also serves as the compile-time type check.
pub(crate) fn infer_expr(
    expr: &Expression,
    inputs: &[&[AttributeInfo]],
    param_types: &[LogicalType],
    agg_terms: Option<&[LogicalType]>,
) -> Result<(LogicalType, bool)> {
    match expr {
        Expression::Constant(v) => Ok((v.ty(), v.is_null())),
        Expression::ColumnRef { tuple_idx, column_idx } => {
            let schema = inputs.get(*tuple_idx).ok_or_else(|| {
                DbError::InvalidArgument(format!("no input tuple {tuple_idx} in this context"))
            })?;
            let attr = schema
                .get(*column_idx)
                .ok_or_else(|| column_out_of_range(*column_idx, schema.len()))?;
            Ok((attr.ty, attr.nullable))
        }
        Expression::Arithmetic { left, right, .. } => {
            let (lt, ln) = infer_expr(left, inputs, param_types, agg_terms)?;
            let (rt, rn) = infer_expr(right, inputs, param_types, agg_terms)?;
            Ok((arithmetic::result_type(lt, rt)?, ln || rn))
        }
        Expression::Compare { left, right, .. } => {
            let (lt, ln) = infer_expr(left, inputs, param_types, agg_terms)?;
            let (rt, rn) = infer_expr(right, inputs, param_types, agg_terms)?;
            cast::promote_pair(lt, rt)?;
            Ok((LogicalType::Bool, ln || rn))
        }
        Expression::Like { input, pattern } => {
            let (it, ln) = infer_expr(input, inputs, param_types, agg_terms)?;
            let (pt, rn) = infer_expr(pattern, inputs, param_types, agg_terms)?;
            for ty in [it, pt] {
                if ty != LogicalType::Varchar && ty != LogicalType::Null {
                    return Err(DbError::TypeError(format!("LIKE requires VARCHAR, got {ty}")));
                }
            }
            Ok((LogicalType::Bool, ln || rn))
        }
        Expression::InList { needle, list } => {
            let (nt, mut nullable) = infer_expr(needle, inputs, param_types, agg_terms)?;
            for item in list {
                let (it, inul) = infer_expr(item, inputs, param_types, agg_terms)?;
                cast::promote_pair(nt, it)?;
                nullable |= inul;
            }
            Ok((LogicalType::Bool, nullable))
        }
        Expression::Logical { left, right, .. } => {
            expect_bool(left, inputs, param_types, agg_terms)?;
            expect_bool(right, inputs, param_types, agg_terms)?;
            Ok((LogicalType::Bool, true))
        }
        Expression::Not(child) => {
            expect_bool(child, inputs, param_types, agg_terms)?;
            Ok((LogicalType::Bool, true))
        }
        Expression::Negate(child) => {
            let (ty, nullable) = infer_expr(child, inputs, param_types, agg_terms)?;
            if !ty.is_numeric() && ty != LogicalType::Null {
                return Err(DbError::TypeError(format!("cannot negate {ty}")));
            }
            Ok((ty, nullable))
        }
        Expression::Cast { child, to } => {
            let (from, nullable) = infer_expr(child, inputs, param_types, agg_terms)?;
            let castable = cast::implicit_cast_allowed(from, *to)
                || from == LogicalType::Varchar
                || *to == LogicalType::Varchar
                || (from.is_numeric() && to.is_numeric())
                || (from.is_numeric() && *to == LogicalType::Bool);
            if !castable {
                return Err(DbError::TypeError(format!("no cast from {from} to {to}")));
            }
            Ok((*to, nullable))
        }
        Expression::Case { clauses, default } => {
            if clauses.is_empty() {
                return Err(DbError::InvalidArgument("CASE requires at least one WHEN".into()));
            }
            let mut result: Option<LogicalType> = None;
            let mut nullable = default.is_none();
            for clause in clauses {
                expect_bool(&clause.when, inputs, param_types, agg_terms)?;
                let (ty, tn) = infer_expr(&clause.then, inputs, param_types, agg_terms)?;
                nullable |= tn;
                result = Some(merge_case_type(result, ty)?);
            }
            if let Some(d) = default {
                let (ty, dn) = infer_expr(d, inputs, param_types, agg_terms)?;
                nullable |= dn;
                result = Some(merge_case_type(result, ty)?);
            }
            Ok((result.unwrap_or(LogicalType::Null), nullable))
        }
        Expression::Parameter { index } => {
            let ty = param_types.get(*index).copied().ok_or_else(|| {
                DbError::ParameterType(format!(
                    "parameter ${index} out of range ({} provided)",
                    param_types.len()
                ))
            })?;
            Ok((ty, false))
        }
        Expression::AggregateRef { term_idx } => {
            let terms = agg_terms.ok_or_else(|| {
                DbError::InvalidArgument("aggregate reference outside an aggregation".into())
            })?;
            let ty = terms
                .get(*term_idx)
                .copied()
                .ok_or_else(|| column_out_of_range(*term_idx, terms.len()))?;
            Ok((ty, true))
        }
        Expression::FunctionCall { function, args } => {
            let mut arg_types = Vec::with_capacity(args.len());
            let mut nullable = false;
            for a in args {
                let (ty, n) = infer_expr(a, inputs, param_types, agg_terms)?;
                arg_types.push(ty);
                nullable |= n;
            }
            Ok((function_output_type(*function, &arg_types)?, nullable))
        }
    }
}

fn fill_slot(slots: &mut [Option<AttributeInfo>], dest: usize, attr: AttributeInfo) -> Result<()> {
    if slots[dest].is_some() {
        return Err(DbError::InvalidArgument(format!("projection column {dest} assigned twice")));
    }
    slots[dest] = Some(attr);
    Ok(())
}

fn project_columns(all: &[AttributeInfo], column_ids: &[usize]) -> Result<Vec<AttributeInfo>> {
    column_ids
        .iter()
        .map(|&c| {
            all.get(c)
                .cloned()
                .ok_or_else(|| column_out_of_range(c, all.len()))
        })
        .collect()
}

fn join_output(
    output: &[(usize, usize)],
    left: &[AttributeInfo],
    right: &[AttributeInfo],
) -> Result<Vec<AttributeInfo>> {
    output
        .iter()
        .map(|&(tuple_idx, col)| {
            let side = match tuple_idx {
                0 => left,
                1 => right,
                _ => {
                    return Err(DbError::InvalidArgument(format!(
                        "join output references tuple {tuple_idx}"
                    )))
                }
            };
            side.get(col)
                .cloned()
                .ok_or_else(|| column_out_of_range(col, side.len()))
        })
        .collect()
}

fn merge_case_type(acc: Option<LogicalType>, ty: LogicalType) -> Result<LogicalType> {
    match acc {
        None => Ok(ty),
        Some(prev) => cast::promote_pair(prev, ty).map_err(|_| {
            DbError::TypeError(format!("CASE branches disagree on result type: {prev} vs {ty}"))
        }),
    }
}

fn column_out_of_range(col: usize, len: usize) -> DbError {
    DbError::InvalidArgument(format!("column index {col} out of range ({len} available)"))
}

pub(crate) fn aggregate_output_type(
    kind: AggregateKind,
    input: Option<LogicalType>,
) -> Result<LogicalType> {
    match kind {
        AggregateKind::CountStar | AggregateKind::Count => Ok(LogicalType::BigInt),
        AggregateKind::Sum => match input {
            Some(ty) if ty.is_integral() => Ok(LogicalType::BigInt),
            Some(LogicalType::Decimal) => Ok(LogicalType::Decimal),
            Some(ty) => Err(DbError::TypeError(format!("SUM over non-numeric type {ty}"))),
            None => Err(DbError::InvalidArgument("SUM requires an argument".into())),
        },
        AggregateKind::Avg => match input {
            Some(ty) if ty.is_numeric() => Ok(LogicalType::Decimal),
            Some(ty) => Err(DbError::TypeError(format!("AVG over non-numeric type {ty}"))),
            None => Err(DbError::InvalidArgument("AVG requires an argument".into())),
        },
        AggregateKind::Min | AggregateKind::Max => input
            .ok_or_else(|| DbError::InvalidArgument("MIN/MAX require an argument".into())),
    }
}

fn function_output_type(function: BuiltinFunction, args: &[LogicalType]) -> Result<LogicalType> {
    use BuiltinFunction::*;
    let expect = |n: usize| {
        if args.len() != n {
            Err(DbError::TypeError(format!(
                "{} expects {n} argument(s), got {}",
                function.name(),
                args.len()
            )))
        } else {
            Ok(())
        }
    };
    let want_varchar = |ty: LogicalType| {
        if ty == LogicalType::Varchar || ty == LogicalType::Null {
            Ok(())
        } else {
            Err(DbError::TypeError(format!("{} expects VARCHAR, got {ty}", function.name())))
        }
    };
    let want_numeric = |ty: LogicalType| {
        if ty.is_numeric() || ty == LogicalType::Null {
            Ok(())
        } else {
            Err(DbError::TypeError(format!("{} expects a numeric type, got {ty}", function.name())))
        }
    };
    match function {
        Upper | Lower | Trim => {
            expect(1)?;
            want_varchar(args[0])?;
            Ok(LogicalType::Varchar)
        }
        Length => {
            expect(1)?;
            want_varchar(args[0])?;
            Ok(LogicalType::Integer)
        }
        Substr => {
            expect(3)?;
            want_varchar(args[0])?;
            want_numeric(args[1])?;
            want_numeric(args[2])?;
            Ok(LogicalType::Varchar)
        }
        Abs => {
            expect(1)?;
            want_numeric(args[0])?;
            Ok(args[0])
        }
        Floor | Ceil | Round | Sqrt => {
            expect(1)?;
            want_numeric(args[0])?;
            Ok(LogicalType::Decimal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Column, Schema};
    use crate::plan::{CaseClause, SeqScanPlan};
    use crate::types::{CmpOp, Value};

    fn catalog_with_table() -> (Catalog, u32) {
        let catalog = Catalog::new();
        let info = catalog
            .create_table(
                "t",
                Schema::new(vec![
                    Column::new("a", LogicalType::Integer).not_null(),
                    Column::new("b", LogicalType::Varchar),
                ]),
            )
            .unwrap();
        let oid = info.oid;
        (catalog, oid)
    }

    fn scan(oid: u32, predicate: Option<Expression>, cols: Vec<usize>) -> PlanNode {
        PlanNode::SeqScan(SeqScanPlan { table_oid: oid, predicate, column_ids: cols })
    }

    #[test]
    fn scan_binds_all_columns_and_projects_output() {
        let (catalog, oid) = catalog_with_table();
        // Predicate over column 0, output only column 1.
        let plan = scan(
            oid,
            Some(Expression::compare(
                CmpOp::Ge,
                Expression::column(0, 0),
                Expression::constant(Value::integer(40)),
            )),
            vec![1],
        );
        let bound = perform_binding(&plan, &catalog, &[]).unwrap();
        assert_eq!(bound.output(0).len(), 1);
        assert_eq!(bound.output(0)[0].name, "b");
        assert_eq!(bound.internal(0).len(), 2);
    }

    #[test]
    fn predicate_must_be_boolean() {
        let (catalog, oid) = catalog_with_table();
        let plan = scan(oid, Some(Expression::constant(Value::integer(1))), vec![0]);
        assert!(matches!(perform_binding(&plan, &catalog, &[]), Err(DbError::TypeError(_))));
    }

    #[test]
    fn case_branches_must_agree() {
        let (catalog, oid) = catalog_with_table();
        let case = Expression::Case {
            clauses: vec![CaseClause {
                when: Expression::constant(Value::boolean(true)),
                then: Expression::constant(Value::integer(1)),
            }],
            default: Some(Box::new(Expression::constant(Value::varchar("x")))),
        };
        let plan = PlanNode::Projection(crate::plan::ProjectionPlan {
            child: Box::new(scan(oid, None, vec![0])),
            target_list: vec![(0, case)],
            direct_map_list: vec![],
        });
        assert!(matches!(perform_binding(&plan, &catalog, &[]), Err(DbError::TypeError(_))));
    }

    #[test]
    fn parameter_types_come_from_the_descriptor() {
        let (catalog, oid) = catalog_with_table();
        let plan = scan(
            oid,
            Some(Expression::compare(
                CmpOp::Eq,
                Expression::column(0, 0),
                Expression::Parameter { index: 0 },
            )),
            vec![0],
        );
        assert!(perform_binding(&plan, &catalog, &[LogicalType::Integer]).is_ok());
        // Unknown parameter index fails at bind time.
        assert!(perform_binding(&plan, &catalog, &[]).is_err());
    }
}
