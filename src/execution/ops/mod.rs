// Operator translators. Compilation walks the plan twice: prepare() runs
// bottom-of-tree last, registering state slots and carving the plan into
// pipelines; produce() then walks top-down, each operator wrapping the
// parent's consume logic into its own sink before delegating production to
// its child. Within a pipeline that wrapping is the fusion point; at a
// pipeline boundary the child's production becomes a separate function run
// before the parent's output phase.

mod aggregate;
mod csv_scan;
mod delete;
mod export;
mod hash_join;
mod index_scan;
mod insert;
mod limit;
mod nested_loop_join;
mod order_by;
mod projection;
mod seq_scan;
mod update;

use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::execution::context::{BatchSink, CompilationContext, ExecutionContext, PipelineFn, PipelineId};
use crate::execution::expr::{self, ExprRef};
use crate::execution::row::RowBatch;
use crate::plan::{AttrId, Expression, PlanNode};
use crate::types::{LogicalType, Value};

/// Prepare pass: assign pipelines and register state slots, children last.
pub fn prepare(
    node: &PlanNode,
    node_id: usize,
    pipeline: PipelineId,
    ctx: &mut CompilationContext<'_>,
) -> Result<()> {
    ctx.assign_node_pipeline(node_id, pipeline);
    let children = ctx.bound.children_of(node_id).to_vec();
    match node {
        PlanNode::SeqScan(_) | PlanNode::IndexScan(_) | PlanNode::CsvScan(_) => Ok(()),
        PlanNode::Projection(p) => prepare(&p.child, children[0], pipeline, ctx),
        PlanNode::Limit(p) => limit::prepare(p, node_id, pipeline, ctx),
        PlanNode::OrderBy(p) => order_by::prepare(p, node_id, pipeline, ctx),
        PlanNode::Aggregate(p) => aggregate::prepare(p, node_id, pipeline, ctx),
        PlanNode::Hash(p) => prepare(&p.child, children[0], pipeline, ctx),
        PlanNode::HashJoin(p) => hash_join::prepare(p, node_id, pipeline, ctx),
        PlanNode::NestedLoopJoin(p) => nested_loop_join::prepare(p, node_id, pipeline, ctx),
        PlanNode::Insert(p) => insert::prepare(p, node_id, pipeline, ctx),
        PlanNode::Update(p) => update::prepare(p, node_id, pipeline, ctx),
        PlanNode::Delete(p) => delete::prepare(p, node_id, pipeline, ctx),
        PlanNode::ExportExternalFile(p) => export::prepare(p, node_id, pipeline, ctx),
    }
}

/// Produce pass: emit the pipeline function that drives tuple production
/// at this operator, pushing rows into `sink`.
pub fn produce(
    node: &PlanNode,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    sink: BatchSink,
) -> Result<PipelineFn> {
    match node {
        PlanNode::SeqScan(p) => seq_scan::produce(p, node_id, ctx, sink),
        PlanNode::IndexScan(p) => index_scan::produce(p, node_id, ctx, sink),
        PlanNode::CsvScan(p) => csv_scan::produce(p, node_id, ctx, sink),
        PlanNode::Projection(p) => projection::produce(p, node_id, ctx, sink),
        PlanNode::Limit(p) => limit::produce(p, node_id, ctx, sink),
        PlanNode::OrderBy(p) => order_by::produce(p, node_id, ctx, sink),
        PlanNode::Aggregate(p) => aggregate::produce(p, node_id, ctx, sink),
        PlanNode::Hash(p) => {
            // The hash build is driven by the enclosing hash join; standalone
            // Hash nodes pass tuples through untouched.
            let child_id = ctx.bound.children_of(node_id)[0];
            produce(&p.child, child_id, ctx, sink)
        }
        PlanNode::HashJoin(p) => hash_join::produce(p, node_id, ctx, sink),
        PlanNode::NestedLoopJoin(p) => nested_loop_join::produce(p, node_id, ctx, sink),
        PlanNode::Insert(p) => insert::produce(p, node_id, ctx, sink),
        PlanNode::Update(p) => update::produce(p, node_id, ctx, sink),
        PlanNode::Delete(p) => delete::produce(p, node_id, ctx, sink),
        PlanNode::ExportExternalFile(p) => export::produce(p, node_id, ctx, sink),
    }
}

/// Whether every operator of the pipeline rooted at `node` (stopping at
/// pipeline boundaries) tolerates tile-group partitioning across workers.
pub(super) fn pipeline_parallel_safe(node: &PlanNode) -> bool {
    match node {
        PlanNode::SeqScan(_) => true,
        PlanNode::Projection(p) => pipeline_parallel_safe(&p.child),
        PlanNode::Limit(p) => pipeline_parallel_safe(&p.child),
        _ => false,
    }
}

/// Evaluate `expr` for every selected row of the batch into a full-length
/// column; unselected positions hold NULLs of the column type.
pub(super) fn evaluate_to_column(
    expr: &ExprRef,
    ty: LogicalType,
    ctx: &mut ExecutionContext<'_>,
    batch: &RowBatch,
) -> Result<Arc<Vec<Value>>> {
    let mut values = vec![Value::null(ty); batch.len()];
    for &pos in batch.selection() {
        values[pos as usize] = expr.eval(ctx, &batch.row(pos))?;
    }
    Ok(Arc::new(values))
}

/// Shrink the batch's selection to rows where the predicate is TRUE.
pub(super) fn filter_batch(
    pred: &ExprRef,
    ctx: &mut ExecutionContext<'_>,
    batch: &mut RowBatch,
) -> Result<()> {
    let mut kept = Vec::with_capacity(batch.count());
    for &pos in batch.selection() {
        if expr::matches(pred, ctx, &batch.row(pos))? {
            kept.push(pos);
        }
    }
    batch.set_selection(kept);
    Ok(())
}

/// Column-ref positions referenced by an expression, per input tuple.
pub(super) fn collect_column_refs(expr: &Expression, out: &mut Vec<(usize, usize)>) {
    if let Expression::ColumnRef { tuple_idx, column_idx } = expr {
        out.push((*tuple_idx, *column_idx));
    }
    for child in expr.children() {
        collect_column_refs(child, out);
    }
}

/// Builder for materialized output batches (joins, aggregates, sorted
/// output): accumulates rows column-wise and flushes full batches into the
/// parent sink.
pub(super) struct BatchBuilder {
    attrs: Vec<AttrId>,
    columns: Vec<Vec<Value>>,
    capacity: usize,
}

impl BatchBuilder {
    pub fn new(attrs: Vec<AttrId>, capacity: usize) -> Self {
        let columns = attrs.iter().map(|_| Vec::with_capacity(capacity)).collect();
        Self { attrs, columns, capacity }
    }

    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.attrs.len() {
            return Err(DbError::Internal(format!(
                "batch builder expected {} columns, got {}",
                self.attrs.len(),
                row.len()
            )));
        }
        for (col, v) in self.columns.iter_mut().zip(row) {
            col.push(v);
        }
        Ok(())
    }

    /// Flush accumulated rows into the sink, leaving the builder empty.
    pub fn flush(&mut self, ctx: &mut ExecutionContext<'_>, sink: &BatchSink) -> Result<()> {
        let len = self.len();
        if len == 0 {
            return Ok(());
        }
        let mut batch = RowBatch::new(len);
        for (attr, col) in self.attrs.iter().zip(self.columns.iter_mut()) {
            let values = std::mem::replace(col, Vec::with_capacity(self.capacity));
            batch.add_column(*attr, Arc::new(values));
        }
        sink.as_ref()(ctx, &mut batch)
    }
}
