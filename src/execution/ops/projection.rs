// Projection is a pure rewrite of the attribute mapping. Direct-mapped
// columns keep their child attribute ids, so only target-list expressions
// cost anything: each is evaluated into a new column before the batch is
// forwarded.

use std::sync::Arc;

use super::evaluate_to_column;
use crate::error::Result;
use crate::execution::context::{BatchSink, CompilationContext, PipelineFn};
use crate::execution::expr::{self, ExprRef, TranslationScope};
use crate::plan::{AttrId, ProjectionPlan};
use crate::types::LogicalType;

pub(super) fn produce(
    plan: &ProjectionPlan,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    sink: BatchSink,
) -> Result<PipelineFn> {
    let bound = ctx.bound;
    let child_id = bound.children_of(node_id)[0];
    let child_attrs = bound.output(child_id);
    let output = bound.output(node_id);
    let scope = TranslationScope::new(vec![child_attrs], bound.param_types());

    let targets: Vec<(AttrId, LogicalType, ExprRef)> = plan
        .target_list
        .iter()
        .map(|(dest, e)| {
            let attr = &output[*dest];
            Ok((attr.id, attr.ty, expr::translate(e, &scope)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let projection_sink: BatchSink = {
        let sink = Arc::clone(&sink);
        Arc::new(move |ctx, batch| {
            for (attr, ty, expr) in &targets {
                let column = evaluate_to_column(expr, *ty, ctx, batch)?;
                batch.add_column(*attr, column);
            }
            sink.as_ref()(ctx, batch)
        })
    };

    super::produce(&plan.child, child_id, ctx, projection_sink)
}
