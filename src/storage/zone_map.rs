use std::cmp::Ordering;

use crate::types::compare::{compare_for_sort, CmpOp};
use crate::types::Value;

/// Per-column min/max summary of a frozen tile group. NULLs are ignored:
/// a `col OP const` conjunct can never be satisfied by a NULL, so pruning
/// against non-NULL bounds is conservative.
#[derive(Debug, Clone)]
pub struct ZoneMap {
    entries: Vec<Option<ZoneEntry>>,
}

#[derive(Debug, Clone)]
struct ZoneEntry {
    min: Value,
    max: Value,
}

impl ZoneMap {
    pub fn build(columns: &[Vec<Value>]) -> Self {
        let entries = columns
            .iter()
            .map(|col| {
                let mut bounds: Option<ZoneEntry> = None;
                for v in col.iter().filter(|v| !v.is_null()) {
                    match &mut bounds {
                        None => bounds = Some(ZoneEntry { min: v.clone(), max: v.clone() }),
                        Some(e) => {
                            if compare_for_sort(v, &e.min) == Ordering::Less {
                                e.min = v.clone();
                            }
                            if compare_for_sort(v, &e.max) == Ordering::Greater {
                                e.max = v.clone();
                            }
                        }
                    }
                }
                bounds
            })
            .collect();
        Self { entries }
    }

    /// True when `column OP constant` is impossible for every tuple in the
    /// group, meaning the whole group can be skipped.
    pub fn can_skip(&self, column: usize, op: CmpOp, constant: &Value) -> bool {
        if constant.is_null() {
            return false;
        }
        let Some(Some(e)) = self.entries.get(column) else {
            // No non-NULL values at all: no row can satisfy the conjunct.
            return matches!(self.entries.get(column), Some(None));
        };
        let vs_min = compare_for_sort(constant, &e.min);
        let vs_max = compare_for_sort(constant, &e.max);
        match op {
            CmpOp::Eq => vs_min == Ordering::Less || vs_max == Ordering::Greater,
            CmpOp::Ne => vs_min == Ordering::Equal && vs_max == Ordering::Equal,
            // col < c is impossible when min >= c
            CmpOp::Lt => vs_min != Ordering::Greater,
            CmpOp::Le => vs_min == Ordering::Less,
            // col > c is impossible when max <= c
            CmpOp::Gt => vs_max != Ordering::Less,
            CmpOp::Ge => vs_max == Ordering::Greater,
        }
    }
}
