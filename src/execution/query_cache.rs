// Content-addressed cache of compiled queries, keyed by structural plan
// equality. find() refreshes recency, add() evicts least-recently-used
// entries past capacity. A reverse index from table OID to cached plans
// lets DDL purge every entry that baked in a dropped table's layout.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use super::query::CompiledQuery;
use crate::catalog::Oid;
use crate::plan::PlanNode;

pub const DEFAULT_QUERY_CACHE_CAPACITY: usize = 1024;

/// Cache key wrapper: hashes and compares the plan structurally.
#[derive(Clone)]
struct PlanKey(Arc<PlanNode>);

impl PartialEq for PlanKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for PlanKey {}

impl std::hash::Hash for PlanKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.structural_hash());
    }
}

struct CacheEntry {
    query: Arc<CompiledQuery>,
    last_used: u64,
}

struct CacheInner {
    entries: HashMap<PlanKey, CacheEntry>,
    by_table: HashMap<Oid, HashSet<u64>>,
    tick: u64,
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
}

pub struct QueryCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

static GLOBAL_CACHE: Lazy<QueryCache> = Lazy::new(QueryCache::default);

impl QueryCache {
    /// Process-wide cache shared by callers that do not scope their own.
    pub fn instance() -> &'static QueryCache {
        &GLOBAL_CACHE
    }

    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                by_table: HashMap::new(),
                tick: 0,
            }),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a structurally equal plan, refreshing its recency.
    pub fn find(&self, plan: &Arc<PlanNode>) -> Option<Arc<CompiledQuery>> {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;
        match inner.entries.get_mut(&PlanKey(Arc::clone(plan))) {
            Some(entry) => {
                entry.last_used = tick;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(&entry.query))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a compiled query, evicting the least-recently-used entries
    /// past capacity.
    pub fn add(&self, plan: Arc<PlanNode>, query: Arc<CompiledQuery>) {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;
        let hash = plan.structural_hash();
        for oid in plan.referenced_tables() {
            inner.by_table.entry(oid).or_default().insert(hash);
        }
        inner.entries.insert(PlanKey(plan), CacheEntry { query, last_used: tick });

        while inner.entries.len() > self.capacity {
            let Some(victim) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            remove_entry(&mut inner, &victim);
        }
    }

    /// Purge every cached plan that references the given table.
    pub fn purge_table(&self, oid: Oid) {
        let mut inner = self.inner.lock();
        let Some(hashes) = inner.by_table.remove(&oid) else { return };
        let victims: Vec<PlanKey> = inner
            .entries
            .keys()
            .filter(|k| hashes.contains(&k.0.structural_hash()))
            .cloned()
            .collect();
        let purged = victims.len();
        for key in victims {
            remove_entry(&mut inner, &key);
        }
        debug!(table = oid, purged, "invalidated cached plans");
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.by_table.clear();
    }

    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            size: self.size(),
        }
    }
}

fn remove_entry(inner: &mut CacheInner, key: &PlanKey) {
    if inner.entries.remove(key).is_some() {
        let hash = key.0.structural_hash();
        for oid in key.0.referenced_tables() {
            if let Some(set) = inner.by_table.get_mut(&oid) {
                set.remove(&hash);
                if set.is_empty() {
                    inner.by_table.remove(&oid);
                }
            }
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_CACHE_CAPACITY)
    }
}
