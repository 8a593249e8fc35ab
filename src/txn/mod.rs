// Minimal MVCC transaction manager. Commit timestamps come from a single
// logical clock; a transaction's snapshot is the clock value at begin, so a
// tuple is visible when its inserting transaction committed at or before the
// snapshot and any deleting transaction committed after it.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{DbError, Result};
use crate::storage::TileGroup;

/// Sentinel for "not yet committed" begin timestamps and "never deleted"
/// end timestamps.
pub const TS_PENDING: u64 = u64::MAX;

const STATE_ACTIVE: u8 = 0;
const STATE_COMMITTED: u8 = 1;
const STATE_ABORTED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Delete,
}

pub(crate) struct WriteRecord {
    pub tile_group: Arc<TileGroup>,
    pub offset: usize,
    pub kind: WriteKind,
}

/// Scratch-memory accounting for one transaction. Operators acquire their
/// working memory against this pool; the manager drains it on commit/abort.
pub struct MemoryPool {
    allocated: AtomicUsize,
    high_water: AtomicUsize,
}

impl MemoryPool {
    fn new() -> Self {
        Self { allocated: AtomicUsize::new(0), high_water: AtomicUsize::new(0) }
    }

    pub fn track(&self, bytes: usize) {
        let now = self.allocated.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.high_water.fetch_max(now, Ordering::Relaxed);
    }

    pub fn release(&self, bytes: usize) {
        self.allocated.fetch_sub(bytes.min(self.allocated.load(Ordering::Relaxed)), Ordering::Relaxed);
    }

    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }

    fn drain(&self) {
        self.allocated.store(0, Ordering::Relaxed);
    }
}

pub struct Transaction {
    id: u64,
    snapshot_ts: u64,
    state: AtomicU8,
    writes: Mutex<Vec<WriteRecord>>,
    pool: MemoryPool,
}

impl Transaction {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn snapshot_ts(&self) -> u64 {
        self.snapshot_ts
    }

    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_ACTIVE
    }

    pub fn pool(&self) -> &MemoryPool {
        &self.pool
    }

    pub(crate) fn record_write(&self, tile_group: Arc<TileGroup>, offset: usize, kind: WriteKind) {
        self.writes.lock().push(WriteRecord { tile_group, offset, kind });
    }
}

pub struct TransactionManager {
    next_txn_id: AtomicU64,
    clock: AtomicU64,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self { next_txn_id: AtomicU64::new(1), clock: AtomicU64::new(0) }
    }

    pub fn begin(&self) -> Transaction {
        let id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);
        let snapshot_ts = self.clock.load(Ordering::Acquire);
        debug!(txn = id, snapshot = snapshot_ts, "begin transaction");
        Transaction {
            id,
            snapshot_ts,
            state: AtomicU8::new(STATE_ACTIVE),
            writes: Mutex::new(Vec::new()),
            pool: MemoryPool::new(),
        }
    }

    /// Commit: stamp every pending write with the new commit timestamp.
    pub fn commit(&self, txn: &Transaction) -> Result<u64> {
        if txn
            .state
            .compare_exchange(STATE_ACTIVE, STATE_COMMITTED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DbError::TransactionAbort(format!("transaction {} is not active", txn.id)));
        }
        let commit_ts = self.clock.fetch_add(1, Ordering::AcqRel) + 1;
        let writes = txn.writes.lock();
        for w in writes.iter() {
            w.tile_group.commit_write(w.offset, w.kind, commit_ts);
        }
        txn.pool.drain();
        debug!(txn = txn.id, commit_ts, writes = writes.len(), "commit transaction");
        Ok(commit_ts)
    }

    /// Abort: roll every pending write back to its pre-transaction state.
    pub fn abort(&self, txn: &Transaction) {
        if txn
            .state
            .compare_exchange(STATE_ACTIVE, STATE_ABORTED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let writes = txn.writes.lock();
        for w in writes.iter() {
            w.tile_group.abort_write(w.offset, w.kind);
        }
        txn.pool.drain();
        debug!(txn = txn.id, writes = writes.len(), "abort transaction");
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
