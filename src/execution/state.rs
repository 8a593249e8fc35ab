// The query-state record. Translators register named, typed slots while the
// plan is being prepared; the layout then freezes and every execution
// allocates a fresh record from it. Slots use interior mutability so a
// shared reference to the record is enough at runtime, which is what lets
// parallel build pipelines touch shared counters while keeping their own
// thread-local sorter and aggregation instances.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, AtomicU64};

use parking_lot::Mutex;

use crate::error::{DbError, Result};
use crate::runtime::{AggregateStates, OaHashTable, TupleSorter};
use crate::types::Value;

pub type SlotId = usize;

/// Right-side payloads chained per join key.
pub type JoinTable = OaHashTable<Vec<Vec<Value>>>;
/// Group key to materialization buffer.
pub type AggTable = OaHashTable<AggregateStates>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Counter,
    Flag,
    JoinTable,
    AggTable,
    GlobalAgg,
    Sorter,
    TupleBuffer,
    Writer,
}

#[derive(Debug, Clone)]
pub struct SlotDescriptor {
    pub name: String,
    pub kind: SlotKind,
}

/// Prepare-then-freeze builder for the state record. No slot may be added
/// once IR generation begins.
pub struct QueryStateLayout {
    slots: Vec<SlotDescriptor>,
    frozen: bool,
}

impl QueryStateLayout {
    pub fn new() -> Self {
        Self { slots: Vec::new(), frozen: false }
    }

    pub fn register(&mut self, name: impl Into<String>, kind: SlotKind) -> Result<SlotId> {
        if self.frozen {
            return Err(DbError::Compile("state layout is frozen".into()));
        }
        self.slots.push(SlotDescriptor { name: name.into(), kind });
        Ok(self.slots.len() - 1)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn descriptors(&self) -> &[SlotDescriptor] {
        &self.slots
    }

    /// Allocate a zeroed state record for one execution.
    pub fn allocate(&self) -> QueryState {
        let slots = self
            .slots
            .iter()
            .map(|d| match d.kind {
                SlotKind::Counter => StateSlot::Counter(AtomicU64::new(0)),
                SlotKind::Flag => StateSlot::Flag(AtomicBool::new(false)),
                SlotKind::JoinTable => StateSlot::JoinTable(Mutex::new(None)),
                SlotKind::AggTable => StateSlot::AggTable(Mutex::new(None)),
                SlotKind::GlobalAgg => StateSlot::GlobalAgg(Mutex::new(None)),
                SlotKind::Sorter => StateSlot::Sorter(Mutex::new(None)),
                SlotKind::TupleBuffer => StateSlot::TupleBuffer(Mutex::new(Vec::new())),
                SlotKind::Writer => StateSlot::Writer(Mutex::new(None)),
            })
            .collect();
        QueryState { slots }
    }
}

impl Default for QueryStateLayout {
    fn default() -> Self {
        Self::new()
    }
}

pub enum StateSlot {
    Counter(AtomicU64),
    Flag(AtomicBool),
    JoinTable(Mutex<Option<JoinTable>>),
    AggTable(Mutex<Option<AggTable>>),
    GlobalAgg(Mutex<Option<AggregateStates>>),
    Sorter(Mutex<Option<TupleSorter>>),
    TupleBuffer(Mutex<Vec<Vec<Value>>>),
    Writer(Mutex<Option<BufWriter<File>>>),
}

pub struct QueryState {
    slots: Vec<StateSlot>,
}

macro_rules! slot_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(&self, id: SlotId) -> Result<&$ty> {
            match self.slots.get(id) {
                Some(StateSlot::$variant(v)) => Ok(v),
                Some(_) => Err(DbError::Internal(format!(
                    concat!("state slot {} is not a ", stringify!($variant)),
                    id
                ))),
                None => Err(DbError::Internal(format!("state slot {id} out of range"))),
            }
        }
    };
}

impl QueryState {
    slot_accessor!(counter, Counter, AtomicU64);
    slot_accessor!(flag, Flag, AtomicBool);
    slot_accessor!(join_table, JoinTable, Mutex<Option<JoinTable>>);
    slot_accessor!(agg_table, AggTable, Mutex<Option<AggTable>>);
    slot_accessor!(global_agg, GlobalAgg, Mutex<Option<AggregateStates>>);
    slot_accessor!(sorter, Sorter, Mutex<Option<TupleSorter>>);
    slot_accessor!(tuple_buffer, TupleBuffer, Mutex<Vec<Vec<Value>>>);
    slot_accessor!(writer, Writer, Mutex<Option<BufWriter<File>>>);
}

/// Worker-local instances of pipeline state for parallel builds. The
/// finalization phase merges these back into the shared record.
pub enum LocalSlot {
    Sorter(TupleSorter),
    AggTable(AggTable),
    GlobalAgg(AggregateStates),
}

pub struct ThreadState {
    local: HashMap<SlotId, LocalSlot>,
}

impl ThreadState {
    pub fn new() -> Self {
        Self { local: HashMap::new() }
    }

    pub fn install(&mut self, id: SlotId, slot: LocalSlot) {
        self.local.insert(id, slot);
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut LocalSlot> {
        self.local.get_mut(&id)
    }

    pub fn take(&mut self, id: SlotId) -> Option<LocalSlot> {
        self.local.remove(&id)
    }
}

impl Default for ThreadState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn layout_freezes() {
        let mut layout = QueryStateLayout::new();
        let c = layout.register("count", SlotKind::Counter).unwrap();
        layout.freeze();
        assert!(layout.register("late", SlotKind::Flag).is_err());
        let state = layout.allocate();
        state.counter(c).unwrap().store(7, Ordering::Relaxed);
        assert_eq!(state.counter(c).unwrap().load(Ordering::Relaxed), 7);
    }

    #[test]
    fn kind_mismatch_is_an_error() {
        let mut layout = QueryStateLayout::new();
        let c = layout.register("count", SlotKind::Counter).unwrap();
        layout.freeze();
        let state = layout.allocate();
        assert!(state.flag(c).is_err());
        assert!(state.counter(c + 1).is_err());
    }

    #[test]
    fn each_allocation_is_independent(){
        let mut layout = QueryStateLayout::new();
        let c = layout.register("count", SlotKind::Counter).unwrap();
        layout.freeze();
        let a = layout.allocate();
        let b = layout.allocate();
        a.counter(c).unwrap().store(5, Ordering::Relaxed);
        assert_eq!(b.counter(c).unwrap().load(Ordering::Relaxed), 0);
    }
}
