// Limit keeps a single counter in the query-state record. Each consumed
// batch reserves a contiguous range of row positions with one fetch-add,
// which is what makes the counter safe under parallel pipelines; rows
// whose global position falls inside the (offset, offset + limit] window
// survive. Once the window is exhausted the pipeline's stop flag is
// raised so the driving scan can quit early. The counter is never reset
// within a query.
//
// A limit directly over an order-by additionally switches the sorter into
// top-K mode: only the first offset + limit tuples are retained.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::Result;
use crate::execution::context::{BatchSink, CompilationContext, PipelineFn, PipelineId};
use crate::execution::state::SlotKind;
use crate::plan::{LimitPlan, PlanNode};

const COUNT_SLOT: &str = "limit_count";

pub(super) fn prepare(
    plan: &LimitPlan,
    node_id: usize,
    pipeline: PipelineId,
    ctx: &mut CompilationContext<'_>,
) -> Result<()> {
    ctx.register_slot(node_id, COUNT_SLOT, SlotKind::Counter)?;
    let child_id = ctx.bound.children_of(node_id)[0];
    if matches!(plan.child.as_ref(), PlanNode::OrderBy(_)) {
        let budget = (plan.offset + plan.limit).min(usize::MAX as u64) as usize;
        ctx.set_top_k_hint(child_id, budget);
    }
    super::prepare(&plan.child, child_id, pipeline, ctx)
}

pub(super) fn produce(
    plan: &LimitPlan,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    sink: BatchSink,
) -> Result<PipelineFn> {
    let count_slot = ctx.slot(node_id, COUNT_SLOT)?;
    let stop_flag = ctx.pipeline(ctx.node_pipeline(node_id)).stop_flag;
    let offset = plan.offset;
    let end = plan.offset.saturating_add(plan.limit);

    let limit_sink: BatchSink = {
        let sink = Arc::clone(&sink);
        Arc::new(move |ctx, batch| {
            let seen = batch.count() as u64;
            let start = ctx.state.counter(count_slot)?.fetch_add(seen, Ordering::SeqCst);
            if start >= end {
                ctx.state.flag(stop_flag)?.store(true, Ordering::Release);
                return Ok(());
            }
            let kept: Vec<u32> = batch
                .selection()
                .iter()
                .enumerate()
                .filter(|(i, _)| {
                    let position = start + *i as u64;
                    position >= offset && position < end
                })
                .map(|(_, &pos)| pos)
                .collect();
            if start + seen >= end {
                ctx.state.flag(stop_flag)?.store(true, Ordering::Release);
            }
            if kept.is_empty() {
                return Ok(());
            }
            batch.set_selection(kept);
            sink.as_ref()(ctx, batch)
        })
    };

    let child_id = ctx.bound.children_of(node_id)[0];
    super::produce(&plan.child, child_id, ctx, limit_sink)
}
