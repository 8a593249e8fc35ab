// Ordered secondary index: a B-tree over key tuples in sort order. Entries
// point at tuple versions; visibility is the scan's problem, the index only
// promises ordered iteration. Deletes leave entries behind the same way the
// storage layer keeps dead versions.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::{IndexInfo, Oid};
use crate::storage::ItemPointer;
use crate::types::compare::compare_for_sort;
use crate::types::Value;

/// Key tuple ordered by the engine's total sort order (NULLs last).
#[derive(Debug, Clone)]
pub struct IndexKey(pub Vec<Value>);

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(&other.0) {
            match compare_for_sort(a, b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality must agree with the sort order, not with structural equality,
// or the tree's invariants break for cross-width integer keys.
impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

pub struct TableIndex {
    info: Arc<IndexInfo>,
    tree: RwLock<BTreeMap<IndexKey, Vec<ItemPointer>>>,
}

impl TableIndex {
    pub fn new(info: Arc<IndexInfo>) -> Self {
        Self { info, tree: RwLock::new(BTreeMap::new()) }
    }

    pub fn oid(&self) -> Oid {
        self.info.oid
    }

    pub fn info(&self) -> &Arc<IndexInfo> {
        &self.info
    }

    fn key_of(&self, tuple: &[Value]) -> IndexKey {
        IndexKey(self.info.key_columns.iter().map(|&c| tuple[c].clone()).collect())
    }

    pub fn insert_entry(&self, tuple: &[Value], ptr: ItemPointer) {
        let key = self.key_of(tuple);
        self.tree.write().entry(key).or_default().push(ptr);
    }

    pub fn len(&self) -> usize {
        self.tree.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.read().is_empty()
    }

    /// Exact-match lookup with every key column bound.
    pub fn scan_point(&self, key: &[Value]) -> Vec<ItemPointer> {
        debug_assert_eq!(key.len(), self.info.key_columns.len());
        self.tree
            .read()
            .get(&IndexKey(key.to_vec()))
            .cloned()
            .unwrap_or_default()
    }

    /// Range scan: equality on a key-column prefix, then optional one-sided
    /// or two-sided bounds on the next key column. Results come back in
    /// index order.
    pub fn scan_range(
        &self,
        prefix: &[Value],
        low: Option<(&Value, bool)>,
        high: Option<(&Value, bool)>,
    ) -> Vec<ItemPointer> {
        let tree = self.tree.read();
        let start: Bound<IndexKey> = match low {
            Some((v, inclusive)) => {
                let mut k = prefix.to_vec();
                k.push(v.clone());
                if inclusive {
                    Bound::Included(IndexKey(k))
                } else {
                    Bound::Excluded(IndexKey(k))
                }
            }
            None if prefix.is_empty() => Bound::Unbounded,
            None => Bound::Included(IndexKey(prefix.to_vec())),
        };

        let mut out = Vec::new();
        for (key, ptrs) in tree.range((start, Bound::Unbounded)) {
            if !prefix_matches(key, prefix) {
                break;
            }
            if low.is_some() || high.is_some() {
                let next = &key.0[prefix.len()];
                if next.is_null() {
                    // NULLs sort last and never satisfy a range bound.
                    break;
                }
                // An exclusive low bound can still admit composite keys that
                // merely extend the bound tuple; re-check the bound column.
                if let Some((lo, inclusive)) = low {
                    match compare_for_sort(next, lo) {
                        Ordering::Less => continue,
                        Ordering::Equal if !inclusive => continue,
                        _ => {}
                    }
                }
                if let Some((hi, inclusive)) = high {
                    match compare_for_sort(next, hi) {
                        Ordering::Greater => break,
                        Ordering::Equal if !inclusive => break,
                        _ => {}
                    }
                }
            }
            out.extend_from_slice(ptrs);
        }
        out
    }

    /// Full ordered iteration.
    pub fn scan_all(&self) -> Vec<ItemPointer> {
        self.tree.read().values().flatten().copied().collect()
    }
}

fn prefix_matches(key: &IndexKey, prefix: &[Value]) -> bool {
    key.0.len() >= prefix.len()
        && key.0[..prefix.len()]
            .iter()
            .zip(prefix)
            .all(|(a, b)| compare_for_sort(a, b) == Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IndexInfo;

    fn index_on(cols: Vec<usize>) -> TableIndex {
        TableIndex::new(Arc::new(IndexInfo {
            oid: 42,
            name: "idx".into(),
            table_oid: 1,
            key_columns: cols,
        }))
    }

    fn ptr(offset: u32) -> ItemPointer {
        ItemPointer { tile_group: 0, offset }
    }

    #[test]
    fn point_lookup_collects_duplicates() {
        let idx = index_on(vec![0]);
        idx.insert_entry(&[Value::integer(5), Value::varchar("a")], ptr(0));
        idx.insert_entry(&[Value::integer(5), Value::varchar("b")], ptr(1));
        idx.insert_entry(&[Value::integer(7), Value::varchar("c")], ptr(2));
        assert_eq!(idx.scan_point(&[Value::integer(5)]).len(), 2);
        assert_eq!(idx.scan_point(&[Value::integer(6)]).len(), 0);
    }

    #[test]
    fn range_scan_respects_bounds() {
        let idx = index_on(vec![0]);
        for i in 0..10 {
            idx.insert_entry(&[Value::integer(i)], ptr(i as u32));
        }
        let r = idx.scan_range(&[], Some((&Value::integer(3), true)), Some((&Value::integer(6), false)));
        assert_eq!(r, vec![ptr(3), ptr(4), ptr(5)]);
        let open = idx.scan_range(&[], Some((&Value::integer(8), false)), None);
        assert_eq!(open, vec![ptr(9)]);
    }

    #[test]
    fn composite_prefix_scan() {
        let idx = index_on(vec![0, 1]);
        idx.insert_entry(&[Value::integer(1), Value::integer(10)], ptr(0));
        idx.insert_entry(&[Value::integer(1), Value::integer(20)], ptr(1));
        idx.insert_entry(&[Value::integer(2), Value::integer(5)], ptr(2));
        let r = idx.scan_range(&[Value::integer(1)], None, Some((&Value::integer(15), true)));
        assert_eq!(r, vec![ptr(0)]);
        let all_of_one = idx.scan_range(&[Value::integer(1)], None, None);
        assert_eq!(all_of_one, vec![ptr(0), ptr(1)]);
    }

    #[test]
    fn ordered_full_scan() {
        let idx = index_on(vec![0]);
        idx.insert_entry(&[Value::integer(3)], ptr(3));
        idx.insert_entry(&[Value::integer(1)], ptr(1));
        idx.insert_entry(&[Value::integer(2)], ptr(2));
        assert_eq!(idx.scan_all(), vec![ptr(1), ptr(2), ptr(3)]);
    }
}
