// Sequential scan: the driving loop of most pipelines. Iterates tile
// groups, prunes frozen groups through their zone maps, materializes the
// columns the pipeline needs for visible tuples, filters by the compiled
// predicate, and pushes the surviving batch into the fused consume chain.
// In a parallel pipeline, tile groups are partitioned across rayon workers
// and each worker consumes into its own thread-local build state.

use std::sync::Arc;

use rayon::prelude::*;

use super::{collect_column_refs, filter_batch};
use crate::error::Result;
use crate::execution::consumer::NoOpConsumer;
use crate::execution::context::{
    BatchSink, CompilationContext, ExecutionContext, PipelineFn, ThreadStateFactory,
    ThreadStateMerge,
};
use crate::execution::expr::{self, ExprRef, TranslationScope};
use crate::execution::row::RowBatch;
use crate::execution::state::SlotId;
use crate::plan::{AttrId, Expression, LogicalOp, SeqScanPlan};
use crate::storage::{ItemPointer, Table, TileGroup};
use crate::types::{CmpOp, Value};

type ScanTileGroupFn =
    Arc<dyn Fn(&mut ExecutionContext<'_>, &TileGroup, usize) -> Result<()> + Send + Sync>;

pub(super) fn produce(
    plan: &SeqScanPlan,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    sink: BatchSink,
) -> Result<PipelineFn> {
    let bound = ctx.bound;
    let internal = bound.internal(node_id);
    let scope = TranslationScope::new(vec![internal], bound.param_types());
    let predicate: Option<ExprRef> =
        plan.predicate.as_ref().map(|p| expr::translate(p, &scope)).transpose()?;

    // Columns the pipeline touches: projected outputs plus predicate refs.
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

    let zone_checks = plan
        .predicate
        .as_ref()
        .map(|p| {
            let mut out = Vec::new();
            collect_zone_conjuncts(p, &mut out);
            out
        })
        .unwrap_or_default();

    let pipeline = ctx.pipeline(ctx.node_pipeline(node_id));
    let stop_flag = pipeline.stop_flag;
    let parallel_exec: Option<(ThreadStateFactory, ThreadStateMerge)> = if pipeline.parallel {
        match (&pipeline.thread_state_factory, &pipeline.thread_state_merge) {
            (Some(f), Some(m)) => Some((Arc::clone(f), Arc::clone(m))),
            _ => None,
        }
    } else {
        None
    };

    let table_oid = plan.table_oid;
    let zone_maps_enabled = ctx.config.enable_zone_maps;
    let worker_threads = ctx.config.worker_threads.max(1);

    let scan_tile_group: ScanTileGroupFn = {
        let sink = Arc::clone(&sink);
        Arc::new(move |ctx, tg, slot_limit| {
            if zone_maps_enabled && !zone_checks.is_empty() && tg.is_immutable() {
                if let Some(zm) = tg.zone_map() {
                    if zone_checks.iter().any(|(col, op, v)| zm.can_skip(*col, *op, v)) {
                        return Ok(());
                    }
                }
            }

            let txn = ctx.txn;
            let (columns, row_ids) = tg.with_data(|data| {
                // Slots past the count observed at pipeline start belong to
                // versions this statement wrote itself; skipping them keeps
                // update/delete from chasing their own writes.
                let upper = data.len().min(slot_limit);
                let visible: Vec<usize> =
                    (0..upper).filter(|&i| data.visible(i, txn)).collect();
                let columns: Vec<(AttrId, Vec<Value>)> = needed
                    .iter()
                    .map(|&(attr, col)| {
                        (attr, visible.iter().map(|&i| data.value(col, i).clone()).collect())
                    })
                    .collect();
                let row_ids: Vec<ItemPointer> = visible
                    .iter()
                    .map(|&i| ItemPointer { tile_group: tg.index(), offset: i as u32 })
                    .collect();
                (columns, row_ids)
            });

            if row_ids.is_empty() {
                return Ok(());
            }
            let mut batch = RowBatch::new(row_ids.len());
            for (attr, values) in columns {
                batch.add_column(attr, Arc::new(values));
            }
            batch.set_row_ids(row_ids);
            if let Some(pred) = &predicate {
                filter_batch(pred, ctx, &mut batch)?;
            }
            if batch.count() > 0 {
                sink.as_ref()(ctx, &mut batch)?;
            }
            Ok(())
        })
    };

    Ok(Arc::new(move |ctx| {
        let table = ctx.storage.table(table_oid)?;
        match &parallel_exec {
            Some((factory, merge)) => {
                scan_parallel(ctx, &table, &scan_tile_group, factory, merge, worker_threads)
            }
            None => scan_serial(ctx, &table, &scan_tile_group, stop_flag),
        }
    }))
}

fn scan_serial(
    ctx: &mut ExecutionContext<'_>,
    table: &Table,
    scan_tile_group: &ScanTileGroupFn,
    stop_flag: SlotId,
) -> Result<()> {
    let state = ctx.state;
    let stop = state.flag(stop_flag)?;
    let groups = table.tile_groups();
    let limits: Vec<usize> = groups.iter().map(|tg| tg.allocated()).collect();
    for (tg, &limit) in groups.iter().zip(&limits) {
        if stop.load(std::sync::atomic::Ordering::Acquire) {
            break;
        }
        scan_tile_group.as_ref()(ctx, tg, limit)?;
    }
    Ok(())
}

fn scan_parallel(
    ctx: &mut ExecutionContext<'_>,
    table: &Table,
    scan_tile_group: &ScanTileGroupFn,
    factory: &ThreadStateFactory,
    merge: &ThreadStateMerge,
    worker_threads: usize,
) -> Result<()> {
    let groups = table.tile_groups();
    if groups.is_empty() {
        return merge.as_ref()(ctx, Vec::new());
    }
    let limits: Vec<usize> = groups.iter().map(|tg| tg.allocated()).collect();
    let chunk = groups.len().div_ceil(worker_threads);
    let txn = ctx.txn;
    let catalog = ctx.catalog;
    let storage = ctx.storage;
    let params = ctx.params;
    let state = ctx.state;
    let batch_size = ctx.batch_size;

    let states = groups
        .par_chunks(chunk)
        .zip(limits.par_chunks(chunk))
        .map(|(piece, piece_limits)| {
            let mut thread_state = factory.as_ref()()?;
            let mut consumer = NoOpConsumer;
            let mut worker_ctx = ExecutionContext {
                txn,
                catalog,
                storage,
                params,
                state,
                consumer: &mut consumer,
                thread_state: Some(&mut thread_state),
                batch_size,
            };
            for (tg, &limit) in piece.iter().zip(piece_limits) {
                scan_tile_group.as_ref()(&mut worker_ctx, tg, limit)?;
            }
            Ok(thread_state)
        })
        .collect::<Result<Vec<_>>>()?;
    merge.as_ref()(ctx, states)
}

/// Extract `col OP const` conjuncts usable against zone maps.
fn collect_zone_conjuncts(expr: &Expression, out: &mut Vec<(usize, CmpOp, Value)>) {
    match expr {
        Expression::Logical { op: LogicalOp::And, left, right } => {
            collect_zone_conjuncts(left, out);
            collect_zone_conjuncts(right, out);
        }
        Expression::Compare { op, left, right } => match (left.as_ref(), right.as_ref()) {
            (Expression::ColumnRef { tuple_idx: 0, column_idx }, Expression::Constant(v)) => {
                out.push((*column_idx, *op, v.clone()));
            }
            (Expression::Constant(v), Expression::ColumnRef { tuple_idx: 0, column_idx }) => {
                out.push((*column_idx, flip(*op), v.clone()));
            }
            _ => {}
        },
        _ => {}
    }
}

fn flip(op: CmpOp) -> CmpOp {
    match op {
        CmpOp::Lt => CmpOp::Gt,
        CmpOp::Le => CmpOp::Ge,
        CmpOp::Gt => CmpOp::Lt,
        CmpOp::Ge => CmpOp::Le,
        CmpOp::Eq | CmpOp::Ne => op,
    }
}
