// Row batches flowing between fused operators. A batch is a set of
// positions with a selection vector of survivors and a column per bound
// attribute; operators extend the attribute map in place rather than
// materializing new batches, so a pipeline works over one batch at a time.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::plan::AttrId;
use crate::storage::ItemPointer;
use crate::types::Value;

pub struct RowBatch {
    len: usize,
    selection: Vec<u32>,
    columns: HashMap<AttrId, Arc<Vec<Value>>>,
    /// Physical tuple locations, when the batch came straight off a scan.
    row_ids: Option<Vec<ItemPointer>>,
}

impl RowBatch {
    /// A batch of `len` positions, all initially selected.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            selection: (0..len as u32).collect(),
            columns: HashMap::new(),
            row_ids: None,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.selection.is_empty()
    }

    /// Number of surviving rows.
    pub fn count(&self) -> usize {
        self.selection.len()
    }

    pub fn selection(&self) -> &[u32] {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Vec<u32>) {
        self.selection = selection;
    }

    pub fn add_column(&mut self, attr: AttrId, values: Arc<Vec<Value>>) {
        debug_assert_eq!(values.len(), self.len);
        self.columns.insert(attr, values);
    }

    pub fn column(&self, attr: AttrId) -> Option<&Arc<Vec<Value>>> {
        self.columns.get(&attr)
    }

    pub fn set_row_ids(&mut self, row_ids: Vec<ItemPointer>) {
        debug_assert_eq!(row_ids.len(), self.len);
        self.row_ids = Some(row_ids);
    }

    pub fn row_id(&self, position: u32) -> Option<ItemPointer> {
        self.row_ids.as_ref().and_then(|ids| ids.get(position as usize)).copied()
    }

    pub fn row(&self, position: u32) -> RowRef<'_> {
        RowRef { batch: self, position }
    }

    /// Run `f` over every selected row, stopping on the first error.
    pub fn iterate(&self, mut f: impl FnMut(RowRef<'_>) -> Result<()>) -> Result<()> {
        for &pos in &self.selection {
            f(RowRef { batch: self, position: pos })?;
        }
        Ok(())
    }
}

/// One row of a batch.
#[derive(Clone, Copy)]
pub struct RowRef<'a> {
    batch: &'a RowBatch,
    position: u32,
}

impl<'a> RowRef<'a> {
    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn row_id(&self) -> Option<ItemPointer> {
        self.batch.row_id(self.position)
    }

    /// Derive the value of a bound attribute for this row.
    pub fn derive_value(&self, attr: AttrId) -> Result<Value> {
        let column = self.batch.columns.get(&attr).ok_or_else(|| {
            DbError::Internal(format!("attribute {attr} is not bound in this batch"))
        })?;
        column
            .get(self.position as usize)
            .cloned()
            .ok_or_else(|| DbError::Internal(format!("row {} out of batch range", self.position)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogicalType;

    #[test]
    fn selection_filters_iteration() {
        let mut batch = RowBatch::new(4);
        batch.add_column(0, Arc::new((0..4).map(Value::integer).collect()));
        batch.set_selection(vec![1, 3]);
        let mut seen = Vec::new();
        batch
            .iterate(|row| {
                seen.push(row.derive_value(0)?.as_i64().unwrap());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![1, 3]);
        assert_eq!(batch.count(), 2);
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn unbound_attribute_is_an_error() {
        let batch = RowBatch::new(1);
        assert!(batch.row(0).derive_value(9).is_err());
    }

    #[test]
    fn null_values_round_trip() {
        let mut batch = RowBatch::new(1);
        batch.add_column(0, Arc::new(vec![Value::null(LogicalType::Integer)]));
        assert!(batch.row(0).derive_value(0).unwrap().is_null());
    }
}
