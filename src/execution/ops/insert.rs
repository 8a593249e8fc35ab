// Insert: either literal VALUES rows or a child row stream. Each tuple is
// cast to the table's column types, copied into a fresh slot, and the
// transaction manager is signalled through the write set recorded on the
// transaction. num_processed counts inserted rows.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::Result;
use crate::execution::context::{BatchSink, CompilationContext, PipelineFn, PipelineId};
use crate::execution::expr::{self, ExprRef, TranslationScope};
use crate::execution::row::RowBatch;
use crate::plan::{AttrId, InsertPlan};
use crate::types::{cast, LogicalType, Value};

pub(super) fn prepare(
    plan: &InsertPlan,
    node_id: usize,
    pipeline: PipelineId,
    ctx: &mut CompilationContext<'_>,
) -> Result<()> {
    ctx.assign_node_pipeline(node_id, pipeline);
    if let Some(child) = &plan.child {
        let child_id = ctx.bound.children_of(node_id)[0];
        super::prepare(child, child_id, pipeline, ctx)?;
    }
    Ok(())
}

pub(super) fn produce(
    plan: &InsertPlan,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    _sink: BatchSink,
) -> Result<PipelineFn> {
    let table_oid = plan.table_oid;
    let column_types: Vec<LogicalType> = ctx
        .catalog
        .table(table_oid)?
        .schema
        .columns
        .iter()
        .map(|c| c.ty)
        .collect();
    let processed = ctx.num_processed;

    match &plan.child {
        None => {
            // Literal VALUES rows: expressions may only use constants and
            // parameters, so they translate in an empty scope.
            let scope = TranslationScope::new(Vec::new(), ctx.bound.param_types());
            let tuples: Vec<Vec<ExprRef>> = plan
                .tuples
                .iter()
                .map(|row| row.iter().map(|e| expr::translate(e, &scope)).collect())
                .collect::<Result<Vec<_>>>()?;
            Ok(Arc::new(move |ctx| {
                let table = ctx.storage.table(table_oid)?;
                let dummy = RowBatch::new(1);
                let row = dummy.row(0);
                for exprs in &tuples {
                    let values = exprs
                        .iter()
                        .zip(&column_types)
                        .map(|(e, &ty)| cast::cast(&e.eval(ctx, &row)?, ty))
                        .collect::<Result<Vec<Value>>>()?;
                    table.insert(ctx.txn, values)?;
                    ctx.state.counter(processed)?.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            }))
        }
        Some(child) => {
            let child_id = ctx.bound.children_of(node_id)[0];
            let child_attrs: Vec<AttrId> =
                ctx.bound.output(child_id).iter().map(|a| a.id).collect();
            let column_types = column_types.clone();
            let insert_sink: BatchSink = Arc::new(move |ctx, batch| {
                let mut staged = Vec::with_capacity(batch.count());
                batch.iterate(|row| {
                    let values = child_attrs
                        .iter()
                        .zip(&column_types)
                        .map(|(&a, &ty)| cast::cast(&row.derive_value(a)?, ty))
                        .collect::<Result<Vec<Value>>>()?;
                    staged.push(values);
                    Ok(())
                })?;
                let table = ctx.storage.table(table_oid)?;
                for values in staged {
                    table.insert(ctx.txn, values)?;
                    ctx.state.counter(processed)?.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            });
            super::produce(child, child_id, ctx, insert_sink)
        }
    }
}
