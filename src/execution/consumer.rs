// Terminal sinks for query results. The driver hands the consumer the
// root output schema before init, then the compiled main pipeline pushes
// row batches into consume().

use std::io::Write;

use crate::error::Result;
use crate::execution::row::RowBatch;
use crate::plan::AttributeInfo;
use crate::types::Value;

pub trait QueryResultConsumer: Send {
    /// Called once with the root plan's output schema, before execution.
    fn prepare(&mut self, _output: &[AttributeInfo]) -> Result<()> {
        Ok(())
    }

    /// Called from init(), after the state record is allocated.
    fn initialize_query_state(&mut self) -> Result<()> {
        Ok(())
    }

    fn consume(&mut self, batch: &RowBatch) -> Result<()>;

    /// Called from teardown(). Must not fail.
    fn teardown_query_state(&mut self) {}

    /// Opt-in for parallel pipeline execution.
    fn supports_parallel_exec(&self) -> bool {
        false
    }
}

/// Collects result tuples, for tests and small result sets.
#[derive(Default)]
pub struct BufferingConsumer {
    output: Vec<AttributeInfo>,
    tuples: Vec<Vec<Value>>,
}

impl BufferingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tuples(&self) -> &[Vec<Value>] {
        &self.tuples
    }

    pub fn into_tuples(self) -> Vec<Vec<Value>> {
        self.tuples
    }

    pub fn output_schema(&self) -> &[AttributeInfo] {
        &self.output
    }
}

impl QueryResultConsumer for BufferingConsumer {
    fn prepare(&mut self, output: &[AttributeInfo]) -> Result<()> {
        self.output = output.to_vec();
        Ok(())
    }

    fn consume(&mut self, batch: &RowBatch) -> Result<()> {
        batch.iterate(|row| {
            let tuple = self
                .output
                .iter()
                .map(|attr| row.derive_value(attr.id))
                .collect::<Result<Vec<_>>>()?;
            self.tuples.push(tuple);
            Ok(())
        })
    }
}

/// Counts result rows without materializing them.
#[derive(Default)]
pub struct CountingConsumer {
    count: u64,
}

impl CountingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl QueryResultConsumer for CountingConsumer {
    fn consume(&mut self, batch: &RowBatch) -> Result<()> {
        self.count += batch.count() as u64;
        Ok(())
    }

    fn supports_parallel_exec(&self) -> bool {
        true
    }
}

/// Writes rows to the given writer, one line per tuple.
pub struct PrintingConsumer<W: Write + Send> {
    output: Vec<AttributeInfo>,
    writer: W,
}

impl<W: Write + Send> PrintingConsumer<W> {
    pub fn new(writer: W) -> Self {
        Self { output: Vec::new(), writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> QueryResultConsumer for PrintingConsumer<W> {
    fn prepare(&mut self, output: &[AttributeInfo]) -> Result<()> {
        self.output = output.to_vec();
        Ok(())
    }

    fn consume(&mut self, batch: &RowBatch) -> Result<()> {
        batch.iterate(|row| {
            let mut first = true;
            for attr in &self.output {
                if !first {
                    write!(self.writer, " | ")?;
                }
                first = false;
                write!(self.writer, "{}", row.derive_value(attr.id)?)?;
            }
            writeln!(self.writer)?;
            Ok(())
        })
    }
}

/// Discards everything; used as the stand-in consumer inside parallel
/// worker contexts, whose pipelines terminate in build sinks.
pub struct NoOpConsumer;

impl QueryResultConsumer for NoOpConsumer {
    fn consume(&mut self, _batch: &RowBatch) -> Result<()> {
        Ok(())
    }

    fn supports_parallel_exec(&self) -> bool {
        true
    }
}
