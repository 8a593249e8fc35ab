// Blocked nested-loop join. The right input is materialized once into a
// tuple buffer; each left batch then forms the outer block, looping every
// buffered right tuple per left row under an arbitrary join predicate.
// Only INNER joins compile.

use std::sync::Arc;

use super::{filter_batch, BatchBuilder};
use crate::error::Result;
use crate::execution::context::{BatchSink, CompilationContext, PipelineFn, PipelineId};
use crate::execution::expr::{self, ExprRef, TranslationScope};
use crate::execution::state::SlotKind;
use crate::plan::{AttrId, NestedLoopJoinPlan};

const BUFFER_SLOT: &str = "right_rows";

pub(super) fn prepare(
    plan: &NestedLoopJoinPlan,
    node_id: usize,
    pipeline: PipelineId,
    ctx: &mut CompilationContext<'_>,
) -> Result<()> {
    ctx.assign_node_pipeline(node_id, pipeline);
    ctx.register_slot(node_id, BUFFER_SLOT, SlotKind::TupleBuffer)?;
    let children = ctx.bound.children_of(node_id).to_vec();
    super::prepare(&plan.left, children[0], pipeline, ctx)?;
    let build = ctx.register_pipeline(false)?;
    super::prepare(&plan.right, children[1], build, ctx)
}

pub(super) fn produce(
    plan: &NestedLoopJoinPlan,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    sink: BatchSink,
) -> Result<PipelineFn> {
    let bound = ctx.bound;
    let children = bound.children_of(node_id).to_vec();
    let (left_id, right_id) = (children[0], children[1]);
    let left_attrs = bound.output(left_id);
    let right_attrs = bound.output(right_id);

    let predicate: Option<ExprRef> = match &plan.predicate {
        Some(p) => {
            let scope = TranslationScope::new(vec![left_attrs, right_attrs], bound.param_types());
            Some(expr::translate(p, &scope)?)
        }
        None => None,
    };

    let left_ids: Vec<AttrId> = left_attrs.iter().map(|a| a.id).collect();
    let right_ids: Vec<AttrId> = right_attrs.iter().map(|a| a.id).collect();
    let slot = ctx.slot(node_id, BUFFER_SLOT)?;
    let batch_capacity = ctx.config.batch_size;

    ctx.add_teardown_step(Arc::new(move |state| {
        if let Ok(s) = state.tuple_buffer(slot) {
            s.lock().clear();
        }
    }));

    let materialize_sink: BatchSink = {
        let right_ids = right_ids.clone();
        Arc::new(move |ctx, batch| {
            let mut staged = Vec::with_capacity(batch.count());
            batch.iterate(|row| {
                staged.push(
                    right_ids.iter().map(|&a| row.derive_value(a)).collect::<Result<Vec<_>>>()?,
                );
                Ok(())
            })?;
            ctx.state.tuple_buffer(slot)?.lock().extend(staged);
            Ok(())
        })
    };

    let join_sink: BatchSink = {
        let sink = Arc::clone(&sink);
        let mut all_ids = left_ids.clone();
        all_ids.extend(&right_ids);
        let left_ids = left_ids.clone();
        Arc::new(move |ctx, batch| {
            let state = ctx.state;
            let right_rows = state.tuple_buffer(slot)?.lock();
            let mut builder = BatchBuilder::new(all_ids.clone(), batch_capacity);
            for &pos in batch.selection() {
                let row = batch.row(pos);
                let left_values = left_ids
                    .iter()
                    .map(|&a| row.derive_value(a))
                    .collect::<Result<Vec<_>>>()?;
                for right in right_rows.iter() {
                    let mut joined = left_values.clone();
                    joined.extend(right.iter().cloned());
                    builder.push_row(joined)?;
                    if builder.is_full() {
                        flush_filtered(&mut builder, &predicate, ctx, &sink)?;
                    }
                }
            }
            flush_filtered(&mut builder, &predicate, ctx, &sink)
        })
    };

    let build_pipeline = super::produce(&plan.right, right_id, ctx, materialize_sink)?;
    let probe_pipeline = super::produce(&plan.left, left_id, ctx, join_sink)?;

    Ok(Arc::new(move |ctx| {
        build_pipeline.as_ref()(ctx)?;
        probe_pipeline.as_ref()(ctx)
    }))
}

fn flush_filtered(
    builder: &mut BatchBuilder,
    predicate: &Option<ExprRef>,
    ctx: &mut crate::execution::context::ExecutionContext<'_>,
    sink: &BatchSink,
) -> Result<()> {
    match predicate {
        None => builder.flush(ctx, sink),
        Some(pred) => {
            let filtering: BatchSink = {
                let pred = pred.clone();
                let inner = Arc::clone(sink);
                Arc::new(move |ctx, batch| {
                    filter_batch(&pred, ctx, batch)?;
                    if batch.count() > 0 {
                        inner.as_ref()(ctx, batch)?;
                    }
                    Ok(())
                })
            };
            builder.flush(ctx, &filtering)
        }
    }
}
