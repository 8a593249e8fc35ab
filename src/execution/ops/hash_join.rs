// Hash join. The right (build) input runs as its own pipeline and fills a
// hash table keyed by the build key expressions; the left (probe) input
// stays in the enclosing pipeline, probing per batch and emitting one
// joined output batch per input batch. Key values are cast to the promoted
// common type of each key pair before hashing so both sides agree
// structurally; NULL keys never match. Only INNER joins compile.

use std::sync::Arc;

use super::{filter_batch, BatchBuilder};
use crate::error::{DbError, Result};
use crate::execution::context::{BatchSink, CompilationContext, ExecutionContext, PipelineFn, PipelineId};
use crate::execution::expr::{self, ExprRef, TranslationScope};
use crate::execution::row::RowRef;
use crate::execution::state::SlotKind;
use crate::plan::{AttrId, Expression, HashJoinPlan, PlanNode};
use crate::runtime::hash_table::hash_values;
use crate::runtime::OaHashTable;
use crate::types::{cast, LogicalType, Value};

const TABLE_SLOT: &str = "join_table";

pub(super) fn prepare(
    plan: &HashJoinPlan,
    node_id: usize,
    pipeline: PipelineId,
    ctx: &mut CompilationContext<'_>,
) -> Result<()> {
    ctx.assign_node_pipeline(node_id, pipeline);
    ctx.register_slot(node_id, TABLE_SLOT, SlotKind::JoinTable)?;
    let children = ctx.bound.children_of(node_id).to_vec();
    // Probe side fuses into the enclosing pipeline; the build side gets a
    // pipeline of its own.
    super::prepare(&plan.left, children[0], pipeline, ctx)?;
    let build = ctx.register_pipeline(false)?;
    super::prepare(&plan.right, children[1], build, ctx)
}

/// The key expressions of the build side: the Hash node's keys when the
/// build input is an explicit Hash plan, the join's own otherwise.
fn build_keys(plan: &HashJoinPlan) -> &[Expression] {
    match plan.right.as_ref() {
        PlanNode::Hash(h) if h.keys.len() == plan.right_keys.len() => &h.keys,
        _ => &plan.right_keys,
    }
}

struct KeyEvaluator {
    exprs: Vec<ExprRef>,
    promoted: Vec<LogicalType>,
}

impl KeyEvaluator {
    /// Evaluate and normalize the key for one row; None when any key part
    /// is NULL (NULL never equals NULL under join semantics).
    fn eval(&self, ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<Option<Vec<Value>>> {
        let mut key = Vec::with_capacity(self.exprs.len());
        for (expr, &ty) in self.exprs.iter().zip(&self.promoted) {
            let v = expr.eval(ctx, row)?;
            if v.is_null() {
                return Ok(None);
            }
            key.push(cast::cast(&v, ty)?);
        }
        Ok(Some(key))
    }
}

pub(super) fn produce(
    plan: &HashJoinPlan,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    sink: BatchSink,
) -> Result<PipelineFn> {
    let bound = ctx.bound;
    let children = bound.children_of(node_id).to_vec();
    let (left_id, right_id) = (children[0], children[1]);
    let left_attrs = bound.output(left_id);
    let right_attrs = bound.output(right_id);
    let left_scope = TranslationScope::new(vec![left_attrs], bound.param_types());
    let right_scope = TranslationScope::new(vec![right_attrs], bound.param_types());

    let mut promoted = Vec::with_capacity(plan.left_keys.len());
    for (l, r) in plan.left_keys.iter().zip(build_keys(plan)) {
        let (lt, _) = left_scope.infer(l)?;
        let (rt, _) = right_scope.infer(r)?;
        promoted.push(cast::promote_pair(lt, rt)?);
    }

    let left_keys = KeyEvaluator {
        exprs: plan
            .left_keys
            .iter()
            .map(|e| expr::translate(e, &left_scope))
            .collect::<Result<Vec<_>>>()?,
        promoted: promoted.clone(),
    };
    let right_keys = KeyEvaluator {
        exprs: build_keys(plan)
            .iter()
            .map(|e| expr::translate(e, &right_scope))
            .collect::<Result<Vec<_>>>()?,
        promoted,
    };

    let predicate: Option<ExprRef> = match &plan.predicate {
        Some(p) => {
            let scope =
                TranslationScope::new(vec![left_attrs, right_attrs], bound.param_types());
            Some(expr::translate(p, &scope)?)
        }
        None => None,
    };

    let left_ids: Vec<AttrId> = left_attrs.iter().map(|a| a.id).collect();
    let right_ids: Vec<AttrId> = right_attrs.iter().map(|a| a.id).collect();
    let slot = ctx.slot(node_id, TABLE_SLOT)?;
    let batch_capacity = ctx.config.batch_size;

    ctx.add_init_step(Arc::new(move |ctx| {
        *ctx.state.join_table(slot)?.lock() = Some(OaHashTable::new());
        Ok(())
    }));
    ctx.add_teardown_step(Arc::new(move |state| {
        if let Ok(s) = state.join_table(slot) {
            s.lock().take();
        }
    }));

    // Build side: key -> chained list of right-side payload tuples.
    let build_sink: BatchSink = {
        let right_ids = right_ids.clone();
        Arc::new(move |ctx, batch| {
            let mut staged = Vec::with_capacity(batch.count());
            for &pos in batch.selection() {
                let row = batch.row(pos);
                let Some(key) = right_keys.eval(ctx, &row)? else { continue };
                let payload = right_ids
                    .iter()
                    .map(|&a| row.derive_value(a))
                    .collect::<Result<Vec<_>>>()?;
                staged.push((key, payload));
            }
            let state = ctx.state;
            let mut guard = state.join_table(slot)?.lock();
            let table = guard
                .as_mut()
                .ok_or_else(|| DbError::Internal("join table missing".into()))?;
            for (key, payload) in staged {
                let hash = hash_values(&key);
                table.get_or_insert_with(hash, &key, Vec::new).push(payload);
            }
            Ok(())
        })
    };

    // Probe side: one joined output batch per probe input batch.
    let probe_sink: BatchSink = {
        let sink = Arc::clone(&sink);
        let mut all_ids = left_ids.clone();
        all_ids.extend(&right_ids);
        Arc::new(move |ctx, batch| {
            let mut builder = BatchBuilder::new(all_ids.clone(), batch_capacity);
            let state = ctx.state;
            let guard = state.join_table(slot)?.lock();
            let table = guard
                .as_ref()
                .ok_or_else(|| DbError::Internal("join table missing".into()))?;
            for &pos in batch.selection() {
                let row = batch.row(pos);
                let Some(key) = left_keys.eval(ctx, &row)? else { continue };
                let hash = hash_values(&key);
                let Some(matches) = table.probe(hash, &key) else { continue };
                let left_values = left_ids
                    .iter()
                    .map(|&a| row.derive_value(a))
                    .collect::<Result<Vec<_>>>()?;
                for payload in matches {
                    let mut joined = left_values.clone();
                    joined.extend(payload.iter().cloned());
                    builder.push_row(joined)?;
                    if builder.is_full() {
                        flush_filtered(&mut builder, &predicate, ctx, &sink)?;
                    }
                }
            }
            flush_filtered(&mut builder, &predicate, ctx, &sink)
        })
    };

    let build_pipeline = super::produce(&plan.right, right_id, ctx, build_sink)?;
    let probe_pipeline = super::produce(&plan.left, left_id, ctx, probe_sink)?;

    Ok(Arc::new(move |ctx| {
        build_pipeline.as_ref()(ctx)?;
        probe_pipeline.as_ref()(ctx)
    }))
}

fn flush_filtered(
    builder: &mut BatchBuilder,
    predicate: &Option<ExprRef>,
    ctx: &mut ExecutionContext<'_>,
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
