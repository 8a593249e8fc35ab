use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::zone_map::ZoneMap;
use super::ItemPointer;
use crate::error::{DbError, Result};
use crate::txn::{Transaction, WriteKind, TS_PENDING};
use crate::types::Value;

/// MVCC header kept per tuple slot.
#[derive(Debug, Clone)]
pub struct TupleHeader {
    /// Commit timestamp of the inserting transaction, TS_PENDING until then.
    pub begin_ts: u64,
    /// Commit timestamp of the deleting transaction, TS_PENDING if live.
    pub end_ts: u64,
    /// Owning transaction while the insert is uncommitted (0 once resolved).
    pub inserter: u64,
    /// Transaction with a pending delete on this slot (0 if none).
    pub deleter: u64,
    /// Newer version of this tuple installed by an update.
    pub next_version: Option<ItemPointer>,
}

/// Column-major slice of a table. Tuple data is append-only; MVCC headers
/// keep mutating after the group fills up and freezes.
pub struct TileGroup {
    index: u32,
    capacity: usize,
    data: RwLock<TileGroupData>,
    immutable: AtomicBool,
    zone_map: RwLock<Option<Arc<ZoneMap>>>,
}

pub struct TileGroupData {
    pub columns: Vec<Vec<Value>>,
    pub headers: Vec<TupleHeader>,
}

impl TileGroupData {
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn value(&self, column: usize, offset: usize) -> &Value {
        &self.columns[column][offset]
    }

    /// Snapshot visibility for one tuple slot.
    pub fn visible(&self, offset: usize, txn: &Transaction) -> bool {
        let h = &self.headers[offset];
        let inserted = if h.begin_ts == TS_PENDING {
            h.inserter == txn.id() && h.inserter != 0
        } else {
            h.begin_ts <= txn.snapshot_ts()
        };
        if !inserted {
            return false;
        }
        if h.deleter == txn.id() && h.deleter != 0 {
            return false;
        }
        h.end_ts == TS_PENDING || h.end_ts > txn.snapshot_ts()
    }
}

impl TileGroup {
    pub fn new(index: u32, capacity: usize, arity: usize) -> Self {
        Self {
            index,
            capacity,
            data: RwLock::new(TileGroupData {
                columns: (0..arity).map(|_| Vec::with_capacity(capacity)).collect(),
                headers: Vec::with_capacity(capacity),
            }),
            immutable: AtomicBool::new(false),
            zone_map: RwLock::new(None),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn allocated(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable.load(Ordering::Acquire)
    }

    pub fn zone_map(&self) -> Option<Arc<ZoneMap>> {
        self.zone_map.read().clone()
    }

    pub fn with_data<R>(&self, f: impl FnOnce(&TileGroupData) -> R) -> R {
        f(&self.data.read())
    }

    /// Append a tuple owned by `txn`. Returns the slot offset, or None when
    /// the group is already full.
    pub(super) fn append(&self, values: Vec<Value>, txn: &Transaction) -> Option<usize> {
        let mut data = self.data.write();
        if data.len() >= self.capacity {
            return None;
        }
        for (col, v) in data.columns.iter_mut().zip(values) {
            col.push(v);
        }
        data.headers.push(TupleHeader {
            begin_ts: TS_PENDING,
            end_ts: TS_PENDING,
            inserter: txn.id(),
            deleter: 0,
            next_version: None,
        });
        Some(data.len() - 1)
    }

    /// Install a pending delete. Fails when another active transaction
    /// already holds a pending delete on the slot.
    pub(super) fn mark_delete(&self, offset: usize, txn: &Transaction) -> Result<()> {
        let mut data = self.data.write();
        let len = data.len();
        let h = data
            .headers
            .get_mut(offset)
            .ok_or_else(|| DbError::Storage(format!("tuple offset {offset} out of range {len}")))?;
        if h.deleter != 0 && h.deleter != txn.id() {
            return Err(DbError::TransactionAbort(format!(
                "write-write conflict on tuple {offset} (held by txn {})",
                h.deleter
            )));
        }
        if h.end_ts != TS_PENDING {
            return Err(DbError::TransactionAbort(format!("tuple {offset} already deleted")));
        }
        h.deleter = txn.id();
        Ok(())
    }

    pub(super) fn link_version(&self, offset: usize, next: ItemPointer) {
        let mut data = self.data.write();
        if let Some(h) = data.headers.get_mut(offset) {
            h.next_version = Some(next);
        }
    }

    /// Called by the transaction manager when `txn` commits.
    pub fn commit_write(&self, offset: usize, kind: WriteKind, commit_ts: u64) {
        let mut data = self.data.write();
        let Some(h) = data.headers.get_mut(offset) else { return };
        match kind {
            WriteKind::Insert => {
                h.begin_ts = commit_ts;
                h.inserter = 0;
            }
            WriteKind::Delete => {
                h.end_ts = commit_ts;
                h.deleter = 0;
            }
        }
    }

    /// Called by the transaction manager when `txn` aborts.
    pub fn abort_write(&self, offset: usize, kind: WriteKind) {
        let mut data = self.data.write();
        let Some(h) = data.headers.get_mut(offset) else { return };
        match kind {
            WriteKind::Insert => {
                // The slot stays allocated but can never become visible.
                h.inserter = 0;
                h.next_version = None;
            }
            WriteKind::Delete => {
                h.deleter = 0;
            }
        }
    }

    /// Freeze the group once full: tuple data stops changing and the zone
    /// map becomes valid for scan pruning.
    pub(super) fn freeze(&self) {
        if self.immutable.swap(true, Ordering::AcqRel) {
            return;
        }
        let data = self.data.read();
        let map = ZoneMap::build(&data.columns);
        *self.zone_map.write() = Some(Arc::new(map));
    }
}
