// Engine façade and driver. Wires the catalog, storage, transaction
// manager and query cache together, and implements the execute() entry
// point: resolve the plan against the cache (compiling on a miss), marshal
// parameters, and run the compiled init/plan/teardown sequence inside the
// caller's transaction.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::{Catalog, Schema};
use crate::error::{DbError, Result};
use crate::execution::compiler::{CompileStats, QueryCompiler};
use crate::execution::consumer::QueryResultConsumer;
use crate::execution::query::RuntimeStats;
use crate::execution::query_cache::QueryCache;
use crate::index::TableIndex;
use crate::plan::PlanNode;
use crate::storage::{StorageManager, Table};
use crate::txn::{Transaction, TransactionManager};
use crate::types::{LogicalType, Value};
use crate::EngineConfig;

/// Outcome of a successful execute() call.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionResult {
    pub processed: u64,
}

/// Optional timing breakdown filled by execute().
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecutionStats {
    pub compile: CompileStats,
    pub runtime: RuntimeStats,
    pub cache_hit: bool,
}

pub struct Database {
    config: EngineConfig,
    catalog: Arc<Catalog>,
    storage: Arc<StorageManager>,
    txns: Arc<TransactionManager>,
    cache: Arc<QueryCache>,
}

impl Database {
    pub fn new(config: EngineConfig) -> Self {
        let storage = Arc::new(StorageManager::new(config.tile_group_capacity));
        let cache = Arc::new(QueryCache::new(config.query_cache_capacity));
        Self {
            config,
            catalog: Arc::new(Catalog::new()),
            storage,
            txns: Arc::new(TransactionManager::new()),
            cache,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn create_table(&self, name: impl Into<String>, schema: Schema) -> Result<Arc<Table>> {
        let info = self.catalog.create_table(name, schema)?;
        Ok(self.storage.create_table(info))
    }

    /// Create a secondary index and backfill it from existing tuple slots.
    pub fn create_index(
        &self,
        name: impl Into<String>,
        table_oid: u32,
        key_columns: Vec<usize>,
    ) -> Result<Arc<TableIndex>> {
        let info = self.catalog.create_index(name, table_oid, key_columns)?;
        let table = self.storage.table(table_oid)?;
        let index = Arc::new(TableIndex::new(info));
        for tg in table.tile_groups() {
            tg.with_data(|data| {
                for offset in 0..data.len() {
                    let tuple: Vec<Value> =
                        data.columns.iter().map(|col| col[offset].clone()).collect();
                    index.insert_entry(
                        &tuple,
                        crate::storage::ItemPointer {
                            tile_group: tg.index(),
                            offset: offset as u32,
                        },
                    );
                }
            });
        }
        table.attach_index(Arc::clone(&index));
        Ok(index)
    }

    /// Drop a table: catalog entry, storage, and every cached plan that
    /// references it.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let oid = self.catalog.drop_table(name)?;
        self.storage.drop_table(oid)?;
        self.cache.purge_table(oid);
        Ok(())
    }

    pub fn begin(&self) -> Transaction {
        self.txns.begin()
    }

    pub fn commit(&self, txn: &Transaction) -> Result<u64> {
        self.txns.commit(txn)
    }

    pub fn abort(&self, txn: &Transaction) {
        self.txns.abort(txn)
    }

    /// Execute a plan inside the given transaction, streaming results into
    /// the consumer. Compiled queries are cached by structural plan
    /// equality and shared across executions.
    pub fn execute(
        &self,
        plan: &Arc<PlanNode>,
        txn: &Transaction,
        params: &[Value],
        consumer: &mut dyn QueryResultConsumer,
        mut stats: Option<&mut ExecutionStats>,
    ) -> Result<ExecutionResult> {
        if !txn.is_active() {
            return Err(DbError::TransactionAbort("transaction is not active".into()));
        }
        let param_types: Vec<LogicalType> = params.iter().map(Value::ty).collect();

        let compiled = match self.cache.find(plan) {
            Some(hit) => {
                if let Some(stats) = stats.as_deref_mut() {
                    stats.cache_hit = true;
                }
                debug!(plan = plan.kind_name(), "query cache hit");
                hit
            }
            None => {
                let compile_stats = stats.as_deref_mut().map(|s| &mut s.compile);
                let compiled = Arc::new(QueryCompiler::compile(
                    &self.catalog,
                    &self.config,
                    Arc::clone(plan),
                    &param_types,
                    consumer.supports_parallel_exec(),
                    compile_stats,
                )?);
                self.cache.add(Arc::clone(plan), Arc::clone(&compiled));
                compiled
            }
        };

        let runtime_stats = stats.as_deref_mut().map(|s| &mut s.runtime);
        let processed = compiled.execute(
            txn,
            &self.catalog,
            &self.storage,
            params,
            consumer,
            runtime_stats,
        )?;
        Ok(ExecutionResult { processed })
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
