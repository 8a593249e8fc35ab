use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};
use crate::types::LogicalType;

pub type Oid = u32;

pub const INVALID_OID: Oid = 0;

// Column definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: LogicalType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: LogicalType) -> Self {
        Self { name: name.into(), ty, nullable: true }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

// Table schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, idx: usize) -> Result<&Column> {
        self.columns
            .get(idx)
            .ok_or_else(|| DbError::Catalog(format!("column index {idx} out of range")))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Catalog entry for a table.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub oid: Oid,
    pub name: String,
    pub schema: Arc<Schema>,
}

/// Catalog entry for a secondary index.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub oid: Oid,
    pub name: String,
    pub table_oid: Oid,
    pub key_columns: Vec<usize>,
}

/// In-memory catalog. Stable OIDs are handed out once and never reused, so
/// a cached plan that references a dropped table can be purged by OID.
pub struct Catalog {
    next_oid: AtomicU32,
    tables: DashMap<Oid, Arc<TableInfo>>,
    tables_by_name: DashMap<String, Oid>,
    indexes: DashMap<Oid, Arc<IndexInfo>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            next_oid: AtomicU32::new(1),
            tables: DashMap::new(),
            tables_by_name: DashMap::new(),
            indexes: DashMap::new(),
        }
    }

    fn allocate_oid(&self) -> Oid {
        self.next_oid.fetch_add(1, Ordering::Relaxed)
    }

    pub fn create_table(&self, name: impl Into<String>, schema: Schema) -> Result<Arc<TableInfo>> {
        let name = name.into();
        if self.tables_by_name.contains_key(&name) {
            return Err(DbError::AlreadyExists(format!("table '{name}'")));
        }
        let info = Arc::new(TableInfo {
            oid: self.allocate_oid(),
            name: name.clone(),
            schema: Arc::new(schema),
        });
        self.tables.insert(info.oid, Arc::clone(&info));
        self.tables_by_name.insert(name, info.oid);
        Ok(info)
    }

    /// Remove the table and its indexes. Returns the dropped OID so the
    /// caller can purge dependent cache entries.
    pub fn drop_table(&self, name: &str) -> Result<Oid> {
        let (_, oid) = self
            .tables_by_name
            .remove(name)
            .ok_or_else(|| DbError::NotFound(format!("table '{name}'")))?;
        self.tables.remove(&oid);
        self.indexes.retain(|_, info| info.table_oid != oid);
        Ok(oid)
    }

    pub fn table(&self, oid: Oid) -> Result<Arc<TableInfo>> {
        self.tables
            .get(&oid)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| DbError::NotFound(format!("table oid {oid}")))
    }

    pub fn table_by_name(&self, name: &str) -> Result<Arc<TableInfo>> {
        let oid = self
            .tables_by_name
            .get(name)
            .map(|e| *e.value())
            .ok_or_else(|| DbError::NotFound(format!("table '{name}'")))?;
        self.table(oid)
    }

    pub fn create_index(
        &self,
        name: impl Into<String>,
        table_oid: Oid,
        key_columns: Vec<usize>,
    ) -> Result<Arc<IndexInfo>> {
        let table = self.table(table_oid)?;
        for &col in &key_columns {
            table.schema.column(col)?;
        }
        let info = Arc::new(IndexInfo {
            oid: self.allocate_oid(),
            name: name.into(),
            table_oid,
            key_columns,
        });
        self.indexes.insert(info.oid, Arc::clone(&info));
        Ok(info)
    }

    pub fn index(&self, oid: Oid) -> Result<Arc<IndexInfo>> {
        self.indexes
            .get(&oid)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| DbError::NotFound(format!("index oid {oid}")))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_col_schema() -> Schema {
        Schema::new(vec![
            Column::new("a", LogicalType::Integer).not_null(),
            Column::new("b", LogicalType::Varchar),
        ])
    }

    #[test]
    fn create_and_lookup() {
        let catalog = Catalog::new();
        let info = catalog.create_table("t", two_col_schema()).unwrap();
        assert_eq!(catalog.table_by_name("t").unwrap().oid, info.oid);
        assert_eq!(catalog.table(info.oid).unwrap().name, "t");
        assert!(catalog.create_table("t", two_col_schema()).is_err());
    }

    #[test]
    fn drop_removes_indexes_too() {
        let catalog = Catalog::new();
        let info = catalog.create_table("t", two_col_schema()).unwrap();
        let idx = catalog.create_index("t_a", info.oid, vec![0]).unwrap();
        let dropped = catalog.drop_table("t").unwrap();
        assert_eq!(dropped, info.oid);
        assert!(catalog.table(info.oid).is_err());
        assert!(catalog.index(idx.oid).is_err());
    }

    #[test]
    fn index_key_columns_validated() {
        let catalog = Catalog::new();
        let info = catalog.create_table("t", two_col_schema()).unwrap();
        assert!(catalog.create_index("bad", info.oid, vec![9]).is_err());
    }
}
