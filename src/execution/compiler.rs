// The query compiler. Walks the plan twice — prepare to lay out state and
// pipelines, produce to emit the fused execution functions — and packages
// the result as a CompiledQuery with init/plan/teardown entry points.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::context::{BatchSink, CompilationContext};
use super::ops;
use super::query::CompiledQuery;
use crate::catalog::Catalog;
use crate::error::{DbError, Result};
use crate::plan::{binding, JoinType, PlanNode};
use crate::types::LogicalType;
use crate::EngineConfig;

/// Per-phase compile timings, filled when the caller asks for them.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompileStats {
    pub setup_ms: f64,
    pub codegen_ms: f64,
}

pub struct QueryCompiler;

impl QueryCompiler {
    /// Compile a plan into an executable query. Fails with UnsupportedPlan
    /// when the tree contains something the compiler refuses, and with a
    /// compile/type error when code generation does; no partial query is
    /// ever produced.
    pub fn compile(
        catalog: &Catalog,
        config: &EngineConfig,
        plan: Arc<PlanNode>,
        param_types: &[LogicalType],
        parallel_enabled: bool,
        mut stats: Option<&mut CompileStats>,
    ) -> Result<CompiledQuery> {
        Self::check_supported(&plan)?;

        let timer = Instant::now();
        let bound = binding::perform_binding(&plan, catalog, param_types)?;
        if let Some(stats) = stats.as_deref_mut() {
            stats.setup_ms = timer.elapsed().as_secs_f64() * 1e3;
        }

        let timer = Instant::now();
        let parallel = parallel_enabled && config.worker_threads > 1;
        let mut ctx = CompilationContext::new(catalog, config, &bound, parallel)?;
        ops::prepare(&plan, 0, 0, &mut ctx)?;
        ctx.layout.freeze();

        // Terminal sink: count produced rows and hand the batch to the
        // caller's consumer.
        let processed = ctx.num_processed;
        let terminal: BatchSink = Arc::new(move |ctx, batch| {
            ctx.state.counter(processed)?.fetch_add(batch.count() as u64, Ordering::Relaxed);
            ctx.consumer.consume(batch)
        });
        let plan_fn = ops::produce(&plan, 0, &mut ctx, terminal)?;
        let num_processed = ctx.num_processed;
        let (layout, init_steps, teardown_steps) = ctx.into_artifacts();
        if let Some(stats) = stats.as_deref_mut() {
            stats.codegen_ms = timer.elapsed().as_secs_f64() * 1e3;
        }

        debug!(
            plan = plan.kind_name(),
            slots = layout.descriptors().len(),
            "compiled query plan"
        );
        Ok(CompiledQuery::new(
            plan,
            Arc::new(layout),
            bound.output(0).to_vec(),
            param_types.to_vec(),
            init_steps,
            plan_fn,
            teardown_steps,
            num_processed,
            config.batch_size,
        ))
    }

    /// Whether the plan (and every nested plan) compiles natively. The only
    /// refusals today are non-INNER joins, which fall back to interpreted
    /// execution outside this engine.
    pub fn is_supported(plan: &PlanNode) -> bool {
        Self::check_supported(plan).is_ok()
    }

    fn check_supported(plan: &PlanNode) -> Result<()> {
        match plan {
            PlanNode::HashJoin(p) if p.join_type != JoinType::Inner => {
                return Err(DbError::UnsupportedPlan(format!(
                    "{:?} hash join is not compiled",
                    p.join_type
                )));
            }
            PlanNode::NestedLoopJoin(p) if p.join_type != JoinType::Inner => {
                return Err(DbError::UnsupportedPlan(format!(
                    "{:?} nested-loop join is not compiled",
                    p.join_type
                )));
            }
            _ => {}
        }
        for child in plan.children() {
            Self::check_supported(child)?;
        }
        Ok(())
    }
}
