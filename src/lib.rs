// FuseDB - code-generating query execution engine for a columnar
// relational database. Core library module.

pub mod catalog;
pub mod database;
pub mod error;
pub mod execution;
pub mod index;
pub mod plan;
pub mod runtime;
pub mod storage;
pub mod txn;
pub mod types;

pub use database::{Database, ExecutionResult, ExecutionStats};
pub use error::{DbError, Result};

use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Worker threads available to parallel pipelines.
    pub worker_threads: usize,
    /// Rows per batch flowing between fused operators.
    pub batch_size: usize,
    /// Tuple slots per tile group.
    pub tile_group_capacity: usize,
    /// Compiled plans retained by the query cache.
    pub query_cache_capacity: usize,
    /// Consult zone maps to prune frozen tile groups during scans.
    pub enable_zone_maps: bool,
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| DbError::InvalidArgument(format!("bad engine config: {e}")))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
            batch_size: 1024,
            tile_group_capacity: storage::DEFAULT_TILE_GROUP_CAPACITY,
            query_cache_capacity: execution::DEFAULT_QUERY_CACHE_CAPACITY,
            enable_zone_maps: true,
        }
    }
}
