// A compiled query: the three entry points plus the state-record layout
// and parameter descriptor. Execution allocates a fresh state record, so a
// single compiled query may run concurrently from many callers. teardown
// runs on every exit path, including failures inside init or plan, and is
// itself infallible and idempotent.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::consumer::QueryResultConsumer;
use super::context::{ExecutionContext, PipelineFn, StepFn, TeardownFn};
use super::state::{QueryState, QueryStateLayout, SlotId};
use crate::catalog::Catalog;
use crate::error::{DbError, Result};
use crate::plan::{AttributeInfo, PlanNode};
use crate::storage::StorageManager;
use crate::txn::Transaction;
use crate::types::{cast, LogicalType, Value};

/// Per-phase execution timings.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuntimeStats {
    pub init_ms: f64,
    pub plan_ms: f64,
    pub tear_down_ms: f64,
}

pub struct CompiledQuery {
    plan: Arc<PlanNode>,
    layout: Arc<QueryStateLayout>,
    output: Vec<AttributeInfo>,
    param_types: Vec<LogicalType>,
    init_steps: Vec<StepFn>,
    plan_fn: PipelineFn,
    teardown_steps: Vec<TeardownFn>,
    num_processed: SlotId,
    batch_size: usize,
}

impl CompiledQuery {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        plan: Arc<PlanNode>,
        layout: Arc<QueryStateLayout>,
        output: Vec<AttributeInfo>,
        param_types: Vec<LogicalType>,
        init_steps: Vec<StepFn>,
        plan_fn: PipelineFn,
        teardown_steps: Vec<TeardownFn>,
        num_processed: SlotId,
        batch_size: usize,
    ) -> Self {
        Self {
            plan,
            layout,
            output,
            param_types,
            init_steps,
            plan_fn,
            teardown_steps,
            num_processed,
            batch_size,
        }
    }

    pub fn plan(&self) -> &Arc<PlanNode> {
        &self.plan
    }

    pub fn output_schema(&self) -> &[AttributeInfo] {
        &self.output
    }

    pub fn param_types(&self) -> &[LogicalType] {
        &self.param_types
    }

    /// Typed copies of the caller's parameters, cast to the declared types.
    fn marshal_params(&self, params: &[Value]) -> Result<Vec<Value>> {
        if params.len() != self.param_types.len() {
            return Err(DbError::ParameterType(format!(
                "expected {} parameters, got {}",
                self.param_types.len(),
                params.len()
            )));
        }
        params
            .iter()
            .zip(&self.param_types)
            .enumerate()
            .map(|(i, (v, &ty))| {
                cast::cast(v, ty).map_err(|_| {
                    DbError::ParameterType(format!(
                        "parameter ${i} has type {}, expected {ty}",
                        v.ty()
                    ))
                })
            })
            .collect()
    }

    fn run_teardown(&self, state: &QueryState, consumer: &mut dyn QueryResultConsumer) {
        for step in &self.teardown_steps {
            step.as_ref()(state);
        }
        consumer.teardown_query_state();
    }

    /// Run init, plan and teardown in order against a fresh state record.
    /// Returns the number of processed rows.
    pub fn execute(
        &self,
        txn: &Transaction,
        catalog: &Catalog,
        storage: &StorageManager,
        params: &[Value],
        consumer: &mut dyn QueryResultConsumer,
        mut stats: Option<&mut RuntimeStats>,
    ) -> Result<u64> {
        let params = self.marshal_params(params)?;
        let state = self.layout.allocate();
        consumer.prepare(&self.output)?;

        let mut ctx = ExecutionContext {
            txn,
            catalog,
            storage,
            params: &params,
            state: &state,
            consumer,
            thread_state: None,
            batch_size: self.batch_size,
        };

        debug!("calling query init()");
        let timer = Instant::now();
        let init_result = ctx
            .consumer
            .initialize_query_state()
            .and_then(|()| self.init_steps.iter().try_for_each(|step| step.as_ref()(&mut ctx)));
        if let Err(e) = init_result {
            self.run_teardown(&state, ctx.consumer);
            return Err(e);
        }
        if let Some(stats) = stats.as_deref_mut() {
            stats.init_ms = timer.elapsed().as_secs_f64() * 1e3;
        }

        debug!("calling query plan()");
        let timer = Instant::now();
        if let Err(e) = (self.plan_fn.as_ref())(&mut ctx) {
            self.run_teardown(&state, ctx.consumer);
            return Err(e);
        }
        if let Some(stats) = stats.as_deref_mut() {
            stats.plan_ms = timer.elapsed().as_secs_f64() * 1e3;
        }

        debug!("calling query teardown()");
        let timer = Instant::now();
        self.run_teardown(&state, ctx.consumer);
        if let Some(stats) = stats.as_deref_mut() {
            stats.tear_down_ms = timer.elapsed().as_secs_f64() * 1e3;
        }

        Ok(state.counter(self.num_processed)?.load(Ordering::Relaxed))
    }
}
