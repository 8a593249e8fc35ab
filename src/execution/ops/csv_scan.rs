// CSV scan: bulk-ingest source. Streams records through the buffered
// reader, parses each field against the declared column types, and pushes
// fixed-size batches into the pipeline. Parsing is fail-fast; the error
// carries the offending line number.

use std::sync::Arc;

use super::BatchBuilder;
use crate::error::{DbError, Result};
use crate::execution::context::{BatchSink, CompilationContext, PipelineFn};
use crate::plan::{AttrId, CsvScanPlan};
use crate::runtime::csv::{parse_field, CsvFormat, CsvReader};
use crate::types::LogicalType;

fn format_char(c: char, what: &str) -> Result<u8> {
    u8::try_from(c)
        .map_err(|_| DbError::InvalidArgument(format!("CSV {what} must be a single-byte character")))
}

pub(super) fn produce(
    plan: &CsvScanPlan,
    node_id: usize,
    ctx: &mut CompilationContext<'_>,
    sink: BatchSink,
) -> Result<PipelineFn> {
    let attrs: Vec<AttrId> = ctx.bound.output(node_id).iter().map(|a| a.id).collect();
    let column_types: Vec<LogicalType> = plan.column_types.clone();
    let format = CsvFormat {
        delimiter: format_char(plan.delimiter, "delimiter")?,
        quote: format_char(plan.quote, "quote")?,
        escape: format_char(plan.escape, "escape")?,
    };
    let path = plan.path.clone();
    let stop_flag = ctx.pipeline(ctx.node_pipeline(node_id)).stop_flag;
    let batch_capacity = ctx.config.batch_size;

    Ok(Arc::new(move |ctx| {
        let mut reader = CsvReader::open(&path, format)?;
        let state = ctx.state;
        let stop = state.flag(stop_flag)?;
        let mut builder = BatchBuilder::new(attrs.clone(), batch_capacity);
        while let Some(fields) = reader.next_row(column_types.len())? {
            let line = reader.line_number();
            let row = column_types
                .iter()
                .zip(&fields)
                .map(|(&ty, text)| parse_field(ty, text, line))
                .collect::<Result<Vec<_>>>()?;
            builder.push_row(row)?;
            if builder.is_full() {
                builder.flush(ctx, &sink)?;
                if stop.load(std::sync::atomic::Ordering::Acquire) {
                    return Ok(());
                }
            }
        }
        builder.flush(ctx, &sink)
    }))
}
