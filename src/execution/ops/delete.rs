// Delete: marks each tuple produced by the child scan as deleted by the
// current transaction. num_processed counts deleted rows.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::execution::context::{BatchSink, CompilationContext, PipelineFn, PipelineId};
use crate::plan::DeletePlan;

pub(super) fn prepare(
    plan: &DeletePlan,
    node_id: usize,
    pipeline: PipelineId,
    ctx: &mut CompilationContext<'_>,
) -> Result<()> {
    ctx.assign_node_pipeline(node_id, pipeline);
    let child_id = ctx.bound.children_of(node_id)[0];
    super::prepare(&plan.child, child_id, pipeline, ctx)
}

pub(super) fn produce(
    plan: &DeletePlan,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    _sink: BatchSink,
) -> Result<PipelineFn> {
    let table_oid = plan.table_oid;
    let processed = ctx.num_processed;

    let delete_sink: BatchSink = Arc::new(move |ctx, batch| {
        let mut pointers = Vec::with_capacity(batch.count());
        batch.iterate(|row| {
            pointers.push(row.row_id().ok_or_else(|| {
                DbError::Execution("delete source has no row locations".into())
            })?);
            Ok(())
        })?;
        let table = ctx.storage.table(table_oid)?;
        for ptr in pointers {
            table.delete(ctx.txn, ptr)?;
            ctx.state.counter(processed)?.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    });

    let child_id = ctx.bound.children_of(node_id)[0];
    super::produce(&plan.child, child_id, ctx, delete_sink)
}
