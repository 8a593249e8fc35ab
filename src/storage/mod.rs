// Columnar table storage. A table is an ordered list of tile groups; scans
// iterate tile groups and consult per-group zone maps for pruning. Tuple
// visibility is governed by the MVCC headers kept alongside each slot.

pub mod tile_group;
pub mod zone_map;

pub use tile_group::{TileGroup, TileGroupData, TupleHeader};
pub use zone_map::ZoneMap;

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::catalog::{Oid, TableInfo};
use crate::error::{DbError, Result};
use crate::index::TableIndex;
use crate::txn::{Transaction, WriteKind};
use crate::types::Value;

/// Physical location of one tuple version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemPointer {
    pub tile_group: u32,
    pub offset: u32,
}

pub const DEFAULT_TILE_GROUP_CAPACITY: usize = 1024;

pub struct Table {
    info: Arc<TableInfo>,
    tile_group_capacity: usize,
    tile_groups: RwLock<Vec<Arc<TileGroup>>>,
    indexes: RwLock<Vec<Arc<TableIndex>>>,
}

impl Table {
    pub fn new(info: Arc<TableInfo>, tile_group_capacity: usize) -> Self {
        Self {
            info,
            tile_group_capacity,
            tile_groups: RwLock::new(Vec::new()),
            indexes: RwLock::new(Vec::new()),
        }
    }

    pub fn oid(&self) -> Oid {
        self.info.oid
    }

    pub fn info(&self) -> &Arc<TableInfo> {
        &self.info
    }

    pub fn tile_groups(&self) -> Vec<Arc<TileGroup>> {
        self.tile_groups.read().clone()
    }

    pub fn tile_group(&self, index: u32) -> Result<Arc<TileGroup>> {
        self.tile_groups
            .read()
            .get(index as usize)
            .cloned()
            .ok_or_else(|| DbError::Storage(format!("tile group {index} out of range")))
    }

    pub fn attach_index(&self, index: Arc<TableIndex>) {
        self.indexes.write().push(index);
    }

    pub fn indexes(&self) -> Vec<Arc<TableIndex>> {
        self.indexes.read().clone()
    }

    pub fn index_by_oid(&self, oid: Oid) -> Result<Arc<TableIndex>> {
        self.indexes
            .read()
            .iter()
            .find(|i| i.oid() == oid)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("index oid {oid} on table {}", self.info.name)))
    }

    /// Upper bound on allocated slots, including invisible versions.
    pub fn allocated_tuples(&self) -> usize {
        self.tile_groups.read().iter().map(|tg| tg.allocated()).sum()
    }

    fn check_tuple(&self, values: &[Value]) -> Result<()> {
        let schema = &self.info.schema;
        if values.len() != schema.arity() {
            return Err(DbError::Execution(format!(
                "tuple has {} values, table '{}' expects {}",
                values.len(),
                self.info.name,
                schema.arity()
            )));
        }
        for (v, col) in values.iter().zip(&schema.columns) {
            if v.is_null() {
                if !col.nullable {
                    return Err(DbError::Execution(format!(
                        "NULL value in NOT NULL column '{}'",
                        col.name
                    )));
                }
                continue;
            }
            if v.ty() != col.ty {
                return Err(DbError::Execution(format!(
                    "type mismatch for column '{}': expected {}, got {}",
                    col.name,
                    col.ty,
                    v.ty()
                )));
            }
        }
        Ok(())
    }

    /// Insert a tuple version owned by `txn` and maintain all indexes.
    pub fn insert(&self, txn: &Transaction, values: Vec<Value>) -> Result<ItemPointer> {
        self.check_tuple(&values)?;
        let ptr = self.append(txn, values.clone())?;
        for index in self.indexes.read().iter() {
            index.insert_entry(&values, ptr);
        }
        Ok(ptr)
    }

    fn append(&self, txn: &Transaction, values: Vec<Value>) -> Result<ItemPointer> {
        let mut groups = self.tile_groups.write();
        loop {
            if let Some(tg) = groups.last() {
                if let Some(offset) = tg.append(values.clone(), txn) {
                    let ptr = ItemPointer { tile_group: tg.index(), offset: offset as u32 };
                    txn.record_write(Arc::clone(tg), offset, WriteKind::Insert);
                    if tg.allocated() == tg.capacity() {
                        tg.freeze();
                    }
                    return Ok(ptr);
                }
            }
            let index = groups.len() as u32;
            groups.push(Arc::new(TileGroup::new(
                index,
                self.tile_group_capacity,
                self.info.schema.arity(),
            )));
        }
    }

    /// Mark the tuple at `ptr` deleted by `txn`.
    pub fn delete(&self, txn: &Transaction, ptr: ItemPointer) -> Result<()> {
        let tg = self.tile_group(ptr.tile_group)?;
        tg.mark_delete(ptr.offset as usize, txn)?;
        txn.record_write(tg, ptr.offset as usize, WriteKind::Delete);
        Ok(())
    }

    /// Write a new version of the tuple at `ptr` and link the old version
    /// to it.
    pub fn update(&self, txn: &Transaction, ptr: ItemPointer, values: Vec<Value>) -> Result<ItemPointer> {
        self.delete(txn, ptr)?;
        let new_ptr = self.insert(txn, values)?;
        self.tile_group(ptr.tile_group)?.link_version(ptr.offset as usize, new_ptr);
        Ok(new_ptr)
    }

    /// Read one visible tuple, cloning its values.
    pub fn read_tuple(&self, txn: &Transaction, ptr: ItemPointer) -> Result<Option<Vec<Value>>> {
        let tg = self.tile_group(ptr.tile_group)?;
        Ok(tg.with_data(|data| {
            let offset = ptr.offset as usize;
            if offset >= data.len() || !data.visible(offset, txn) {
                return None;
            }
            Some(data.columns.iter().map(|col| col[offset].clone()).collect())
        }))
    }
}

/// Owner of all table data, keyed by catalog OID.
pub struct StorageManager {
    tables: DashMap<Oid, Arc<Table>>,
    tile_group_capacity: usize,
}

impl StorageManager {
    pub fn new(tile_group_capacity: usize) -> Self {
        Self { tables: DashMap::new(), tile_group_capacity }
    }

    pub fn create_table(&self, info: Arc<TableInfo>) -> Arc<Table> {
        let table = Arc::new(Table::new(info, self.tile_group_capacity));
        self.tables.insert(table.oid(), Arc::clone(&table));
        table
    }

    pub fn drop_table(&self, oid: Oid) -> Result<()> {
        self.tables
            .remove(&oid)
            .map(|_| ())
            .ok_or_else(|| DbError::NotFound(format!("table oid {oid}")))
    }

    pub fn table(&self, oid: Oid) -> Result<Arc<Table>> {
        self.tables
            .get(&oid)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| DbError::NotFound(format!("table oid {oid}")))
    }
}

impl Default for StorageManager {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_GROUP_CAPACITY)
    }
}
