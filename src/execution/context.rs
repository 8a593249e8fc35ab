// Compilation and execution contexts. CompilationContext carries everything
// the translators share while a plan is being turned into code: the bound
// attribute schemas, the state layout under construction, the pipeline
// registry, and the init/teardown step lists. ExecutionContext is the
// runtime view threaded through the compiled functions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::{DbError, Result};
use crate::execution::consumer::QueryResultConsumer;
use crate::execution::row::RowBatch;
use crate::execution::state::{QueryState, QueryStateLayout, SlotId, SlotKind, ThreadState};
use crate::plan::BoundPlan;
use crate::storage::StorageManager;
use crate::txn::Transaction;
use crate::types::Value;
use crate::EngineConfig;

pub type PipelineId = usize;

pub type StepFn = Arc<dyn Fn(&mut ExecutionContext<'_>) -> Result<()> + Send + Sync>;
pub type TeardownFn = Arc<dyn Fn(&QueryState) + Send + Sync>;
pub type BatchSink = Arc<dyn Fn(&mut ExecutionContext<'_>, &mut RowBatch) -> Result<()> + Send + Sync>;
pub type PipelineFn = Arc<dyn Fn(&mut ExecutionContext<'_>) -> Result<()> + Send + Sync>;
pub type ThreadStateFactory = Arc<dyn Fn() -> Result<ThreadState> + Send + Sync>;
pub type ThreadStateMerge =
    Arc<dyn Fn(&mut ExecutionContext<'_>, Vec<ThreadState>) -> Result<()> + Send + Sync>;

/// A maximal chain of operators fused into one loop. Pipelines past the
/// main one (id 0) are build sides of pipeline-breaking operators.
pub struct Pipeline {
    pub id: PipelineId,
    /// Worker partitioning enabled for this pipeline's driver.
    pub parallel: bool,
    /// Cooperative stop flag checked by the pipeline's driving scan.
    pub stop_flag: SlotId,
    /// Factory for worker-local state instances (parallel builds).
    pub thread_state_factory: Option<ThreadStateFactory>,
    /// Folds worker-local instances back into the shared record.
    pub thread_state_merge: Option<ThreadStateMerge>,
}

pub struct CompilationContext<'a> {
    pub catalog: &'a Catalog,
    pub config: &'a EngineConfig,
    pub bound: &'a BoundPlan,
    /// Consumer opted into parallel execution and workers are available.
    pub parallel_enabled: bool,
    pub layout: QueryStateLayout,
    pipelines: Vec<Pipeline>,
    node_pipeline: Vec<PipelineId>,
    slot_map: HashMap<(usize, &'static str), SlotId>,
    top_k_hints: HashMap<usize, usize>,
    pub init_steps: Vec<StepFn>,
    pub teardown_steps: Vec<TeardownFn>,
    /// Counter advanced by DML operators and the terminal consume.
    pub num_processed: SlotId,
}

impl<'a> CompilationContext<'a> {
    pub fn new(
        catalog: &'a Catalog,
        config: &'a EngineConfig,
        bound: &'a BoundPlan,
        parallel_enabled: bool,
    ) -> Result<Self> {
        let mut layout = QueryStateLayout::new();
        let num_processed = layout.register("num_processed", SlotKind::Counter)?;
        let main_stop = layout.register("pipeline0_stop", SlotKind::Flag)?;
        let main = Pipeline {
            id: 0,
            parallel: false,
            stop_flag: main_stop,
            thread_state_factory: None,
            thread_state_merge: None,
        };
        Ok(Self {
            catalog,
            config,
            bound,
            parallel_enabled,
            layout,
            pipelines: vec![main],
            node_pipeline: vec![0; bound.node_count()],
            slot_map: HashMap::new(),
            top_k_hints: HashMap::new(),
            init_steps: Vec::new(),
            teardown_steps: Vec::new(),
            num_processed,
        })
    }

    /// Register a new pipeline for the build side of a pipeline break.
    pub fn register_pipeline(&mut self, parallel: bool) -> Result<PipelineId> {
        let id = self.pipelines.len();
        let stop_flag = self.layout.register(format!("pipeline{id}_stop"), SlotKind::Flag)?;
        self.pipelines.push(Pipeline {
            id,
            parallel,
            stop_flag,
            thread_state_factory: None,
            thread_state_merge: None,
        });
        Ok(id)
    }

    pub fn pipeline(&self, id: PipelineId) -> &Pipeline {
        &self.pipelines[id]
    }

    pub fn pipeline_mut(&mut self, id: PipelineId) -> &mut Pipeline {
        &mut self.pipelines[id]
    }

    pub fn is_last_pipeline(&self, id: PipelineId) -> bool {
        id == 0
    }

    pub fn assign_node_pipeline(&mut self, node_id: usize, pipeline: PipelineId) {
        self.node_pipeline[node_id] = pipeline;
    }

    pub fn node_pipeline(&self, node_id: usize) -> PipelineId {
        self.node_pipeline[node_id]
    }

    /// Register a named state slot owned by `node_id`.
    pub fn register_slot(
        &mut self,
        node_id: usize,
        name: &'static str,
        kind: SlotKind,
    ) -> Result<SlotId> {
        let id = self.layout.register(format!("n{node_id}_{name}"), kind)?;
        self.slot_map.insert((node_id, name), id);
        Ok(id)
    }

    pub fn slot(&self, node_id: usize, name: &'static str) -> Result<SlotId> {
        self.slot_map
            .get(&(node_id, name))
            .copied()
            .ok_or_else(|| DbError::Internal(format!("no slot '{name}' registered for node {node_id}")))
    }

    /// Limit-over-OrderBy fusion: the limit records the tuple budget the
    /// sorter should retain.
    pub fn set_top_k_hint(&mut self, order_by_node: usize, k: usize) {
        self.top_k_hints.insert(order_by_node, k);
    }

    pub fn top_k_hint(&self, order_by_node: usize) -> Option<usize> {
        self.top_k_hints.get(&order_by_node).copied()
    }

    pub fn add_init_step(&mut self, step: StepFn) {
        self.init_steps.push(step);
    }

    pub fn add_teardown_step(&mut self, step: TeardownFn) {
        self.teardown_steps.push(step);
    }

    /// Tear the context apart once code generation is done.
    pub fn into_artifacts(self) -> (QueryStateLayout, Vec<StepFn>, Vec<TeardownFn>) {
        (self.layout, self.init_steps, self.teardown_steps)
    }
}

/// Runtime state threaded through init/plan/teardown and every fused sink.
pub struct ExecutionContext<'a> {
    pub txn: &'a Transaction,
    pub catalog: &'a Catalog,
    pub storage: &'a StorageManager,
    /// Typed parameter values, marshalled by the driver.
    pub params: &'a [Value],
    pub state: &'a QueryState,
    pub consumer: &'a mut dyn QueryResultConsumer,
    /// Worker-local state inside a parallel build pipeline.
    pub thread_state: Option<&'a mut ThreadState>,
    pub batch_size: usize,
}
