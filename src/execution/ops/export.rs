// Export: writes the consumed row stream to an external file as CSV.
// Fields containing the delimiter, quote, or a newline are quoted, with
// embedded quotes escaped. The writer lives in the query state so teardown
// can drop it on any exit path.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::execution::context::{BatchSink, CompilationContext, PipelineFn, PipelineId};
use crate::execution::state::SlotKind;
use crate::plan::{AttrId, ExportExternalFilePlan};

const WRITER_SLOT: &str = "export_writer";

pub(super) fn prepare(
    plan: &ExportExternalFilePlan,
    node_id: usize,
    pipeline: PipelineId,
    ctx: &mut CompilationContext<'_>,
) -> Result<()> {
    ctx.assign_node_pipeline(node_id, pipeline);
    ctx.register_slot(node_id, WRITER_SLOT, SlotKind::Writer)?;
    let child_id = ctx.bound.children_of(node_id)[0];
    super::prepare(&plan.child, child_id, pipeline, ctx)
}

fn render_field(value: &str, delimiter: char, quote: char, escape: char) -> String {
    let must_quote =
        value.contains(delimiter) || value.contains(quote) || value.contains('\n') || value.contains('\r');
    if !must_quote {
        return value.to_owned();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        if c == quote {
            out.push(escape);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

pub(super) fn produce(
    plan: &ExportExternalFilePlan,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    _sink: BatchSink,
) -> Result<PipelineFn> {
    let bound = ctx.bound;
    let child_id = bound.children_of(node_id)[0];
    let attrs: Vec<AttrId> = bound.output(child_id).iter().map(|a| a.id).collect();
    let slot = ctx.slot(node_id, WRITER_SLOT)?;
    let (delimiter, quote, escape) = (plan.delimiter, plan.quote, plan.escape);
    let path = plan.path.clone();

    ctx.add_init_step(Arc::new(move |ctx| {
        let file = File::create(&path)?;
        *ctx.state.writer(slot)?.lock() = Some(BufWriter::new(file));
        Ok(())
    }));
    ctx.add_teardown_step(Arc::new(move |state| {
        if let Ok(s) = state.writer(slot) {
            if let Some(mut w) = s.lock().take() {
                let _ = w.flush();
            }
        }
    }));

    let write_sink: BatchSink = {
        let attrs = attrs.clone();
        Arc::new(move |ctx, batch| {
            let mut lines = String::new();
            batch.iterate(|row| {
                let mut first = true;
                for &attr in &attrs {
                    if !first {
                        lines.push(delimiter);
                    }
                    first = false;
                    let value = row.derive_value(attr)?;
                    if !value.is_null() {
                        lines.push_str(&render_field(&value.to_string(), delimiter, quote, escape));
                    }
                }
                lines.push('\n');
                Ok(())
            })?;
            let state = ctx.state;
            let mut guard = state.writer(slot)?.lock();
            let writer = guard
                .as_mut()
                .ok_or_else(|| DbError::Internal("export writer missing".into()))?;
            writer.write_all(lines.as_bytes())?;
            Ok(())
        })
    };

    let child_pipeline = super::produce(&plan.child, child_id, ctx, write_sink)?;
    Ok(Arc::new(move |ctx| {
        child_pipeline.as_ref()(ctx)?;
        let state = ctx.state;
        let mut guard = state.writer(slot)?.lock();
        if let Some(writer) = guard.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }))
}
