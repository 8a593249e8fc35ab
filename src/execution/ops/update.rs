// Update: the child scan produces every table column plus physical row
// locations. Target expressions compute the new values, untouched columns
// carry over, and the storage layer writes a linked new version of each
// tuple. num_processed counts updated rows.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::execution::context::{BatchSink, CompilationContext, PipelineFn, PipelineId};
use crate::execution::expr::{self, ExprRef, TranslationScope};
use crate::plan::{AttrId, UpdatePlan};
use crate::types::{cast, LogicalType, Value};

pub(super) fn prepare(
    plan: &UpdatePlan,
    node_id: usize,
    pipeline: PipelineId,
    ctx: &mut CompilationContext<'_>,
) -> Result<()> {
    ctx.assign_node_pipeline(node_id, pipeline);
    let child_id = ctx.bound.children_of(node_id)[0];
    super::prepare(&plan.child, child_id, pipeline, ctx)
}

pub(super) fn produce(
    plan: &UpdatePlan,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    _sink: BatchSink,
) -> Result<PipelineFn> {
    let bound = ctx.bound;
    let child_id = bound.children_of(node_id)[0];
    let child_attrs: Vec<AttrId> = bound.output(child_id).iter().map(|a| a.id).collect();
    let column_types: Vec<LogicalType> = ctx
        .catalog
        .table(plan.table_oid)?
        .schema
        .columns
        .iter()
        .map(|c| c.ty)
        .collect();

    let scope = TranslationScope::new(vec![bound.output(child_id)], bound.param_types());
    let targets: HashMap<usize, ExprRef> = plan
        .target_list
        .iter()
        .map(|(col, e)| Ok((*col, expr::translate(e, &scope)?)))
        .collect::<Result<HashMap<_, _>>>()?;

    let table_oid = plan.table_oid;
    let processed = ctx.num_processed;

    let update_sink: BatchSink = Arc::new(move |ctx, batch| {
        let mut staged = Vec::with_capacity(batch.count());
        batch.iterate(|row| {
            let ptr = row
                .row_id()
                .ok_or_else(|| DbError::Execution("update source has no row locations".into()))?;
            let values = child_attrs
                .iter()
                .enumerate()
                .map(|(col, &attr)| {
                    let raw = match targets.get(&col) {
                        Some(e) => e.eval(ctx, &row)?,
                        None => row.derive_value(attr)?,
                    };
                    cast::cast(&raw, column_types[col])
                })
                .collect::<Result<Vec<Value>>>()?;
            staged.push((ptr, values));
            Ok(())
        })?;
        let table = ctx.storage.table(table_oid)?;
        for (ptr, values) in staged {
            table.update(ctx.txn, ptr, values)?;
            ctx.state.counter(processed)?.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    });

    super::produce(&plan.child, child_id, ctx, update_sink)
}
