// Order-by: a pipeline boundary. The build side feeds every input tuple
// into the sorter held in the query state (or a worker-local sorter under
// a parallel build, merged afterwards); the output side iterates the
// sorted run and re-emits batches into the parent pipeline. Ascending
// keys place NULLs last, descending keys first.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::{pipeline_parallel_safe, BatchBuilder};
use crate::error::{DbError, Result};
use crate::execution::context::{BatchSink, CompilationContext, PipelineFn, PipelineId};
use crate::execution::state::{LocalSlot, SlotKind, ThreadState};
use crate::plan::{AttrId, OrderByPlan};
use crate::runtime::{TupleComparator, TupleSorter};
use crate::types::compare::compare_for_sort;
use crate::types::Value;

const SORTER_SLOT: &str = "sorter";

fn make_comparator(keys: Vec<(usize, bool)>) -> TupleComparator {
    Arc::new(move |a: &[Value], b: &[Value]| {
        for &(col, descending) in &keys {
            let mut ord = compare_for_sort(&a[col], &b[col]);
            if descending {
                ord = ord.reverse();
            }
            if ord != CmpOrdering::Equal {
                return ord;
            }
        }
        CmpOrdering::Equal
    })
}

fn new_sorter(
    width: usize,
    keys: &[(usize, bool)],
    top_k: Option<usize>,
) -> Result<TupleSorter> {
    let cmp = make_comparator(keys.to_vec());
    match top_k {
        Some(k) => TupleSorter::with_top_k(width, cmp, k),
        None => TupleSorter::new(width, cmp),
    }
}

pub(super) fn prepare(
    plan: &OrderByPlan,
    node_id: usize,
    pipeline: PipelineId,
    ctx: &mut CompilationContext<'_>,
) -> Result<()> {
    ctx.assign_node_pipeline(node_id, pipeline);
    let sorter_slot = ctx.register_slot(node_id, SORTER_SLOT, SlotKind::Sorter)?;

    let parallel = ctx.parallel_enabled && pipeline_parallel_safe(&plan.child);
    let build = ctx.register_pipeline(parallel)?;

    if parallel {
        let child_id = ctx.bound.children_of(node_id)[0];
        let width = ctx.bound.output(child_id).len();
        let keys = plan.sort_keys.clone();
        let top_k = ctx.top_k_hint(node_id);
        let factory_keys = keys.clone();
        let pipeline_ref = ctx.pipeline_mut(build);
        pipeline_ref.thread_state_factory = Some(Arc::new(move || {
            let mut ts = ThreadState::new();
            ts.install(sorter_slot, LocalSlot::Sorter(new_sorter(width, &factory_keys, top_k)?));
            Ok(ts)
        }));
        pipeline_ref.thread_state_merge = Some(Arc::new(move |ctx, mut states| {
            let locals: Vec<TupleSorter> = states
                .iter_mut()
                .filter_map(|ts| match ts.take(sorter_slot) {
                    Some(LocalSlot::Sorter(s)) => Some(s),
                    _ => None,
                })
                .collect();
            let mut guard = ctx.state.sorter(sorter_slot)?.lock();
            let sorter = guard
                .as_mut()
                .ok_or_else(|| DbError::Internal("sorter was not initialized".into()))?;
            sorter.sort_parallel(locals)
        }));
    }

    let child_id = ctx.bound.children_of(node_id)[0];
    super::prepare(&plan.child, child_id, build, ctx)
}

pub(super) fn produce(
    plan: &OrderByPlan,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    sink: BatchSink,
) -> Result<PipelineFn> {
    let bound = ctx.bound;
    let child_id = bound.children_of(node_id)[0];
    let attrs: Vec<AttrId> = bound.output(child_id).iter().map(|a| a.id).collect();
    let width = attrs.len();
    let keys = plan.sort_keys.clone();
    let top_k = ctx.top_k_hint(node_id);
    let sorter_slot = ctx.slot(node_id, SORTER_SLOT)?;
    let parent_stop = ctx.pipeline(ctx.node_pipeline(node_id)).stop_flag;

    // init: allocate the sorter; teardown: drop it. Teardown is idempotent
    // and must not allocate.
    {
        let keys = keys.clone();
        ctx.add_init_step(Arc::new(move |ctx| {
            *ctx.state.sorter(sorter_slot)?.lock() = Some(new_sorter(width, &keys, top_k)?);
            Ok(())
        }));
    }
    ctx.add_teardown_step(Arc::new(move |state| {
        if let Ok(slot) = state.sorter(sorter_slot) {
            slot.lock().take();
        }
    }));

    let build_sink: BatchSink = {
        let attrs = attrs.clone();
        Arc::new(move |ctx, batch| {
            // Worker-local sorter when inside a parallel build.
            if let Some(ts) = ctx.thread_state.as_deref_mut() {
                if let Some(LocalSlot::Sorter(sorter)) = ts.get_mut(sorter_slot) {
                    return batch.iterate(|row| {
                        let tuple = attrs
                            .iter()
                            .map(|&a| row.derive_value(a))
                            .collect::<Result<Vec<_>>>()?;
                        sorter.append(tuple)
                    });
                }
            }
            let state = ctx.state;
            let mut guard = state.sorter(sorter_slot)?.lock();
            let sorter = guard
                .as_mut()
                .ok_or_else(|| DbError::Internal("sorter was not initialized".into()))?;
            batch.iterate(|row| {
                let tuple =
                    attrs.iter().map(|&a| row.derive_value(a)).collect::<Result<Vec<_>>>()?;
                sorter.append(tuple)
            })
        })
    };

    let build_pipeline = super::produce(&plan.child, child_id, ctx, build_sink)?;
    let batch_capacity = ctx.config.batch_size;

    Ok(Arc::new(move |ctx| {
        build_pipeline.as_ref()(ctx)?;

        let state = ctx.state;
        let mut guard = state.sorter(sorter_slot)?.lock();
        let sorter = guard
            .as_mut()
            .ok_or_else(|| DbError::Internal("sorter was not initialized".into()))?;
        sorter.sort();
        ctx.txn.pool().track(sorter.memory_estimate());

        let stop = state.flag(parent_stop)?;
        let mut builder = BatchBuilder::new(attrs.clone(), batch_capacity);
        for tuple in sorter.iter() {
            builder.push_row(tuple.to_vec())?;
            if builder.is_full() {
                builder.flush(ctx, &sink)?;
                if stop.load(Ordering::Acquire) {
                    return Ok(());
                }
            }
        }
        builder.flush(ctx, &sink)
    }))
}
