// Index scan. Key expressions are evaluated once per execution (they are
// constants or parameters), then one of three modes runs: point lookup
// when every key column is bound by equality, range scan for an equality
// prefix with bounds, and full ordered iteration otherwise. Tuples come
// back in index order; visibility and the residual predicate are applied
// before batching.

use std::sync::Arc;

use super::{collect_column_refs, filter_batch};
use crate::error::{DbError, Result};
use crate::execution::context::{BatchSink, CompilationContext, PipelineFn};
use crate::execution::expr::{self, ExprRef, TranslationScope};
use crate::execution::row::RowBatch;
use crate::plan::{AttrId, IndexScanPlan};
use crate::storage::ItemPointer;
use crate::types::{CmpOp, Value};

pub(super) fn produce(
    plan: &IndexScanPlan,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    sink: BatchSink,
) -> Result<PipelineFn> {
    let bound = ctx.bound;
    let internal = bound.internal(node_id);
    let scope = TranslationScope::new(vec![internal], bound.param_types());
    let predicate: Option<ExprRef> =
        plan.predicate.as_ref().map(|p| expr::translate(p, &scope)).transpose()?;

    // Key expressions must not reference scan columns; translate them in an
    // empty scope so stray column references fail at compile time.
    let key_scope = TranslationScope::new(Vec::new(), bound.param_types());
    let eq_keys: Vec<ExprRef> = plan
        .eq_keys
        .iter()
        .map(|e| expr::translate(e, &key_scope))
        .collect::<Result<Vec<_>>>()?;
    let low: Option<(bool, ExprRef)> = match &plan.low {
        Some((op, e)) => {
            let inclusive = match op {
                CmpOp::Ge => true,
                CmpOp::Gt => false,
                other => {
                    return Err(DbError::UnsupportedPlan(format!(
                        "index low bound with operator {}",
                        other.symbol()
                    )))
                }
            };
            Some((inclusive, expr::translate(e, &key_scope)?))
        }
        None => None,
    };
    let high: Option<(bool, ExprRef)> = match &plan.high {
        Some((op, e)) => {
            let inclusive = match op {
                CmpOp::Le => true,
                CmpOp::Lt => false,
                other => {
                    return Err(DbError::UnsupportedPlan(format!(
                        "index high bound with operator {}",
                        other.symbol()
                    )))
                }
            };
            Some((inclusive, expr::translate(e, &key_scope)?))
        }
        None => None,
    };

    let mut needed: Vec<(AttrId, usize)> = Vec::new();
    let mut add_col = |col: usize, needed: &mut Vec<(AttrId, usize)>| {
        let attr = internal[col].id;
        if !needed.iter().any(|(a, _)| *a == attr) {
            needed.push((attr, col));
        }
    };
    for &col in &plan.column_ids {
        add_col(col, &mut needed);
    }
    if let Some(pred) = &plan.predicate {
        let mut refs = Vec::new();
        collect_column_refs(pred, &mut refs);
        for (tuple, col) in refs {
            if tuple == 0 {
                add_col(col, &mut needed);
            }
        }
    }

    let table_oid = plan.table_oid;
    let index_oid = plan.index_oid;
    let key_column_count = ctx.catalog.index(index_oid)?.key_columns.len();
    let stop_flag = ctx.pipeline(ctx.node_pipeline(node_id)).stop_flag;
    let batch_capacity = ctx.config.batch_size;

    Ok(Arc::new(move |ctx| {
        let table = ctx.storage.table(table_oid)?;
        let index = table.index_by_oid(index_oid)?;

        let dummy = RowBatch::new(1);
        let row = dummy.row(0);
        let prefix = eq_keys
            .iter()
            .map(|e| e.eval(ctx, &row))
            .collect::<Result<Vec<_>>>()?;
        let low_value = match &low {
            Some((inclusive, e)) => Some((e.eval(ctx, &row)?, *inclusive)),
            None => None,
        };
        let high_value = match &high {
            Some((inclusive, e)) => Some((e.eval(ctx, &row)?, *inclusive)),
            None => None,
        };

        // Mode selection: point, range, or full scan in index order.
        let pointers: Vec<ItemPointer> = if prefix.len() == key_column_count
            && low_value.is_none()
            && high_value.is_none()
        {
            index.scan_point(&prefix)
        } else if !prefix.is_empty() || low_value.is_some() || high_value.is_some() {
            index.scan_range(
                &prefix,
                low_value.as_ref().map(|(v, inc)| (v, *inc)),
                high_value.as_ref().map(|(v, inc)| (v, *inc)),
            )
        } else {
            index.scan_all()
        };

        let state = ctx.state;
        let stop = state.flag(stop_flag)?;
        for chunk in pointers.chunks(batch_capacity.max(1)) {
            if stop.load(std::sync::atomic::Ordering::Acquire) {
                break;
            }
            let mut rows: Vec<(ItemPointer, Vec<Value>)> = Vec::with_capacity(chunk.len());
            for &ptr in chunk {
                if let Some(values) = table.read_tuple(ctx.txn, ptr)? {
                    rows.push((ptr, values));
                }
            }
            if rows.is_empty() {
                continue;
            }
            let mut batch = RowBatch::new(rows.len());
            for &(attr, col) in &needed {
                let column: Vec<Value> = rows.iter().map(|(_, vs)| vs[col].clone()).collect();
                batch.add_column(attr, Arc::new(column));
            }
            batch.set_row_ids(rows.iter().map(|(p, _)| *p).collect());
            if let Some(pred) = &predicate {
                filter_batch(pred, ctx, &mut batch)?;
            }
            if batch.count() > 0 {
                sink.as_ref()(ctx, &mut batch)?;
            }
        }
        Ok(())
    }))
}
