// Aggregation, global and grouped. The child runs as a separate build
// pipeline that advances per-term state in place: a single materialization
// buffer for the global case, a hash table keyed by the group columns for
// GROUP BY. The output phase finalizes each buffer (AVG divides its sum by
// its count), applies HAVING, and emits one row per group. Grouped output
// order is insertion-independent.

use std::sync::Arc;

use super::{filter_batch, pipeline_parallel_safe, BatchBuilder};
use crate::error::{DbError, Result};
use crate::execution::context::{BatchSink, CompilationContext, ExecutionContext, PipelineFn, PipelineId};
use crate::execution::expr::{self, ExprRef, TranslationScope};
use crate::execution::row::RowRef;
use crate::execution::state::{LocalSlot, SlotKind, ThreadState};
use crate::plan::{AggregatePlan, AggregateStrategy, AttrId};
use crate::runtime::hash_table::hash_values;
use crate::runtime::{AggregateSpec, AggregateStates, OaHashTable};
use crate::types::Value;

const GLOBAL_SLOT: &str = "global_agg";
const TABLE_SLOT: &str = "agg_table";

fn aggregate_specs(plan: &AggregatePlan, ctx: &CompilationContext<'_>, node_id: usize) -> Vec<AggregateSpec> {
    let output = ctx.bound.output(node_id);
    plan.terms
        .iter()
        .enumerate()
        .map(|(i, term)| AggregateSpec {
            kind: term.kind,
            distinct: term.distinct,
            output_ty: output[plan.group_by.len() + i].ty,
        })
        .collect()
}

pub(super) fn prepare(
    plan: &AggregatePlan,
    node_id: usize,
    pipeline: PipelineId,
    ctx: &mut CompilationContext<'_>,
) -> Result<()> {
    ctx.assign_node_pipeline(node_id, pipeline);
    let parallel = ctx.parallel_enabled && pipeline_parallel_safe(&plan.child);
    let build = ctx.register_pipeline(parallel)?;

    match plan.strategy {
        AggregateStrategy::Plain => {
            let slot = ctx.register_slot(node_id, GLOBAL_SLOT, SlotKind::GlobalAgg)?;
            if parallel {
                let specs = aggregate_specs(plan, ctx, node_id);
                let factory_specs = specs.clone();
                let pipeline_ref = ctx.pipeline_mut(build);
                pipeline_ref.thread_state_factory = Some(Arc::new(move || {
                    let mut ts = ThreadState::new();
                    ts.install(slot, LocalSlot::GlobalAgg(AggregateStates::new(&factory_specs)));
                    Ok(ts)
                }));
                pipeline_ref.thread_state_merge = Some(Arc::new(move |ctx, mut states| {
                    let mut guard = ctx.state.global_agg(slot)?.lock();
                    let main = guard
                        .as_mut()
                        .ok_or_else(|| DbError::Internal("aggregate state missing".into()))?;
                    for ts in states.iter_mut() {
                        if let Some(LocalSlot::GlobalAgg(local)) = ts.take(slot) {
                            main.merge(&specs, local)?;
                        }
                    }
                    Ok(())
                }));
            }
        }
        AggregateStrategy::Hash => {
            let slot = ctx.register_slot(node_id, TABLE_SLOT, SlotKind::AggTable)?;
            if parallel {
                let specs = aggregate_specs(plan, ctx, node_id);
                let pipeline_ref = ctx.pipeline_mut(build);
                pipeline_ref.thread_state_factory = Some(Arc::new(move || {
                    let mut ts = ThreadState::new();
                    ts.install(slot, LocalSlot::AggTable(OaHashTable::new()));
                    Ok(ts)
                }));
                pipeline_ref.thread_state_merge = Some(Arc::new(move |ctx, mut states| {
                    let mut guard = ctx.state.agg_table(slot)?.lock();
                    let main = guard
                        .as_mut()
                        .ok_or_else(|| DbError::Internal("aggregation table missing".into()))?;
                    for ts in states.iter_mut() {
                        if let Some(LocalSlot::AggTable(mut local)) = ts.take(slot) {
                            for (key, partial) in local.drain() {
                                let hash = hash_values(&key);
                                main.get_or_insert_with(hash, &key, || {
                                    AggregateStates::new(&specs)
                                })
                                .merge(&specs, partial)?;
                            }
                        }
                    }
                    Ok(())
                }));
            }
        }
    }

    let child_id = ctx.bound.children_of(node_id)[0];
    super::prepare(&plan.child, child_id, build, ctx)
}

/// Evaluate the per-term inputs for one row.
fn term_inputs(
    inputs: &[Option<ExprRef>],
    ctx: &ExecutionContext<'_>,
    row: &RowRef<'_>,
) -> Result<Vec<Option<Value>>> {
    inputs
        .iter()
        .map(|maybe| maybe.as_ref().map(|e| e.eval(ctx, row)).transpose())
        .collect()
}

pub(super) fn produce(
    plan: &AggregatePlan,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    sink: BatchSink,
) -> Result<PipelineFn> {
    let bound = ctx.bound;
    let child_id = bound.children_of(node_id)[0];
    let child_attrs = bound.output(child_id);
    let output = bound.output(node_id);
    let group_len = plan.group_by.len();
    let specs = aggregate_specs(plan, ctx, node_id);

    let scope = TranslationScope::new(vec![child_attrs], bound.param_types());
    let inputs: Vec<Option<ExprRef>> = plan
        .terms
        .iter()
        .map(|t| t.input.as_ref().map(|e| expr::translate(e, &scope)).transpose())
        .collect::<Result<Vec<_>>>()?;

    let output_attrs: Vec<AttrId> = output.iter().map(|a| a.id).collect();

    let having: Option<ExprRef> = match &plan.having {
        Some(h) => {
            let term_attrs = &output[group_len..];
            let having_scope = TranslationScope::with_aggregates(
                vec![output],
                bound.param_types(),
                term_attrs,
            );
            Some(expr::translate(h, &having_scope)?)
        }
        None => None,
    };

    let batch_capacity = ctx.config.batch_size;

    match plan.strategy {
        AggregateStrategy::Plain => {
            let slot = ctx.slot(node_id, GLOBAL_SLOT)?;
            {
                let specs = specs.clone();
                ctx.add_init_step(Arc::new(move |ctx| {
                    *ctx.state.global_agg(slot)?.lock() = Some(AggregateStates::new(&specs));
                    Ok(())
                }));
            }
            ctx.add_teardown_step(Arc::new(move |state| {
                if let Ok(s) = state.global_agg(slot) {
                    s.lock().take();
                }
            }));

            let build_sink: BatchSink = {
                let specs = specs.clone();
                let inputs = inputs.clone();
                Arc::new(move |ctx, batch| {
                    // Evaluate term inputs first so the state buffer can be
                    // held mutably while advancing.
                    let mut rows = Vec::with_capacity(batch.count());
                    for &pos in batch.selection() {
                        rows.push(term_inputs(&inputs, ctx, &batch.row(pos))?);
                    }
                    if let Some(ts) = ctx.thread_state.as_deref_mut() {
                        if let Some(LocalSlot::GlobalAgg(states)) = ts.get_mut(slot) {
                            for row in rows {
                                states.advance(&specs, &row)?;
                            }
                            return Ok(());
                        }
                    }
                    let state = ctx.state;
                    let mut guard = state.global_agg(slot)?.lock();
                    let states = guard
                        .as_mut()
                        .ok_or_else(|| DbError::Internal("aggregate state missing".into()))?;
                    for row in rows {
                        states.advance(&specs, &row)?;
                    }
                    Ok(())
                })
            };

            let build_pipeline = super::produce(&plan.child, child_id, ctx, build_sink)?;
            let specs = specs.clone();
            Ok(Arc::new(move |ctx| {
                build_pipeline.as_ref()(ctx)?;
                let finalized = {
                    let state = ctx.state;
                    let guard = state.global_agg(slot)?.lock();
                    let states = guard
                        .as_ref()
                        .ok_or_else(|| DbError::Internal("aggregate state missing".into()))?;
                    states.finalize(&specs)?
                };
                let mut batch = crate::execution::row::RowBatch::new(1);
                for (attr, value) in output_attrs.iter().zip(finalized) {
                    batch.add_column(*attr, Arc::new(vec![value]));
                }
                if let Some(pred) = &having {
                    filter_batch(pred, ctx, &mut batch)?;
                }
                if batch.count() > 0 {
                    sink.as_ref()(ctx, &mut batch)?;
                }
                Ok(())
            }))
        }
        AggregateStrategy::Hash => {
            let slot = ctx.slot(node_id, TABLE_SLOT)?;
            ctx.add_init_step(Arc::new(move |ctx| {
                *ctx.state.agg_table(slot)?.lock() = Some(OaHashTable::new());
                Ok(())
            }));
            ctx.add_teardown_step(Arc::new(move |state| {
                if let Ok(s) = state.agg_table(slot) {
                    s.lock().take();
                }
            }));

            let group_attrs: Vec<AttrId> =
                plan.group_by.iter().map(|&c| child_attrs[c].id).collect();
            let build_sink: BatchSink = {
                let specs = specs.clone();
                let inputs = inputs.clone();
                Arc::new(move |ctx, batch| {
                    // Evaluate keys and inputs first so the table can be
                    // held mutably while advancing.
                    let mut rows = Vec::with_capacity(batch.count());
                    for &pos in batch.selection() {
                        let row = batch.row(pos);
                        let key = group_attrs
                            .iter()
                            .map(|&a| row.derive_value(a))
                            .collect::<Result<Vec<_>>>()?;
                        let values = term_inputs(&inputs, ctx, &row)?;
                        rows.push((key, values));
                    }
                    if let Some(ts) = ctx.thread_state.as_deref_mut() {
                        if let Some(LocalSlot::AggTable(table)) = ts.get_mut(slot) {
                            for (key, values) in rows {
                                let hash = hash_values(&key);
                                table
                                    .get_or_insert_with(hash, &key, || AggregateStates::new(&specs))
                                    .advance(&specs, &values)?;
                            }
                            return Ok(());
                        }
                    }
                    let state = ctx.state;
                    let mut guard = state.agg_table(slot)?.lock();
                    let table = guard
                        .as_mut()
                        .ok_or_else(|| DbError::Internal("aggregation table missing".into()))?;
                    for (key, values) in rows {
                        let hash = hash_values(&key);
                        table
                            .get_or_insert_with(hash, &key, || AggregateStates::new(&specs))
                            .advance(&specs, &values)?;
                    }
                    Ok(())
                })
            };

            let build_pipeline = super::produce(&plan.child, child_id, ctx, build_sink)?;
            let specs = specs.clone();
            Ok(Arc::new(move |ctx| {
                build_pipeline.as_ref()(ctx)?;
                let groups = {
                    let state = ctx.state;
                    let mut guard = state.agg_table(slot)?.lock();
                    let table = guard
                        .as_mut()
                        .ok_or_else(|| DbError::Internal("aggregation table missing".into()))?;
                    table.drain()
                };
                let mut builder = BatchBuilder::new(output_attrs.clone(), batch_capacity);
                for (key, states) in groups {
                    let mut row = key;
                    row.extend(states.finalize(&specs)?);
                    builder.push_row(row)?;
                    if builder.is_full() {
                        flush_with_having(&mut builder, &having, ctx, &sink)?;
                    }
                }
                flush_with_having(&mut builder, &having, ctx, &sink)
            }))
        }
    }
}

fn flush_with_having(
    builder: &mut BatchBuilder,
    having: &Option<ExprRef>,
    ctx: &mut ExecutionContext<'_>,
    sink: &BatchSink,
) -> Result<()> {
    match having {
        None => builder.flush(ctx, sink),
        Some(pred) => {
            let filtering_sink: BatchSink = {
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
            builder.flush(ctx, &filtering_sink)
        }
    }
}
