// Per-group aggregate state. One AggregateStates record is the
// "materialization buffer" for a group: a cell per term, advanced in place
// as rows arrive and finalized once the build pipeline completes.
//
// DISTINCT terms keep a per-group set of seen inputs. The set starts as a
// compact sorted array and upgrades to a hash table past a threshold, so
// high-cardinality grouping does not pay a full hash set per group.

use std::cmp::Ordering;

use super::hash_table::{hash_values, OaHashTable};
use crate::error::{DbError, Result};
use crate::plan::AggregateKind;
use crate::types::compare::compare_for_sort;
use crate::types::{arithmetic, cast, ArithOp, LogicalType, Value};

const DISTINCT_UPGRADE_THRESHOLD: usize = 64;

#[derive(Debug, Clone)]
pub struct AggregateSpec {
    pub kind: AggregateKind,
    pub distinct: bool,
    pub output_ty: LogicalType,
}

pub enum DistinctSet {
    Compact(Vec<Value>),
    Hashed(OaHashTable<()>),
}

impl DistinctSet {
    fn new() -> Self {
        DistinctSet::Compact(Vec::new())
    }

    /// Insert, returning true when the value was not present.
    fn insert(&mut self, v: &Value) -> bool {
        match self {
            DistinctSet::Compact(values) => {
                match values.binary_search_by(|probe| compare_for_sort(probe, v)) {
                    Ok(_) => false,
                    Err(pos) => {
                        values.insert(pos, v.clone());
                        if values.len() > DISTINCT_UPGRADE_THRESHOLD {
                            let mut table = OaHashTable::new();
                            for v in values.drain(..) {
                                let key = std::slice::from_ref(&v);
                                table.get_or_insert_with(hash_values(key), key, || ());
                            }
                            *self = DistinctSet::Hashed(table);
                        }
                        true
                    }
                }
            }
            DistinctSet::Hashed(table) => {
                let key = std::slice::from_ref(v);
                let hash = hash_values(key);
                if table.probe(hash, key).is_some() {
                    false
                } else {
                    table.get_or_insert_with(hash, key, || ());
                    true
                }
            }
        }
    }

    fn for_each(&self, mut f: impl FnMut(&Value) -> Result<()>) -> Result<()> {
        match self {
            DistinctSet::Compact(values) => {
                for v in values {
                    f(v)?;
                }
                Ok(())
            }
            DistinctSet::Hashed(table) => {
                for (key, ()) in table.iter() {
                    f(&key[0])?;
                }
                Ok(())
            }
        }
    }
}

struct AggCell {
    count: u64,
    /// Running SUM / MIN / MAX; NULL until the first non-NULL input.
    acc: Value,
    distinct: Option<DistinctSet>,
}

pub struct AggregateStates {
    cells: Vec<AggCell>,
}

impl AggregateStates {
    pub fn new(specs: &[AggregateSpec]) -> Self {
        let cells = specs
            .iter()
            .map(|spec| AggCell {
                count: 0,
                acc: Value::null(accumulator_type(spec)),
                distinct: spec.distinct.then(DistinctSet::new),
            })
            .collect();
        Self { cells }
    }

    /// Advance every term with one input row. `inputs` is aligned with the
    /// spec list; COUNT(*) terms carry no input.
    pub fn advance(&mut self, specs: &[AggregateSpec], inputs: &[Option<Value>]) -> Result<()> {
        for ((cell, spec), input) in self.cells.iter_mut().zip(specs).zip(inputs) {
            if spec.kind == AggregateKind::CountStar {
                cell.count += 1;
                continue;
            }
            let Some(v) = input else {
                return Err(DbError::Internal("aggregate term is missing its input".into()));
            };
            // SQL aggregates skip NULL inputs.
            if v.is_null() {
                continue;
            }
            if let Some(set) = &mut cell.distinct {
                set.insert(v);
                continue;
            }
            advance_cell(cell, spec, v)?;
        }
        Ok(())
    }

    /// Fold another partial state into this one (parallel finalization).
    pub fn merge(&mut self, specs: &[AggregateSpec], other: AggregateStates) -> Result<()> {
        for ((cell, spec), mut theirs) in self.cells.iter_mut().zip(specs).zip(other.cells) {
            match (&mut cell.distinct, theirs.distinct.take()) {
                (Some(mine), Some(theirs)) => {
                    theirs.for_each(|v| {
                        mine.insert(v);
                        Ok(())
                    })?;
                }
                _ => {
                    cell.count += theirs.count;
                    if !theirs.acc.is_null() {
                        if cell.acc.is_null() {
                            cell.acc = theirs.acc;
                        } else {
                            cell.acc = combine(spec, &cell.acc, &theirs.acc)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Produce the output value of every term. AVG divides its running sum
    /// by its running count; empty inputs finalize to NULL except COUNT.
    pub fn finalize(&self, specs: &[AggregateSpec]) -> Result<Vec<Value>> {
        self.cells
            .iter()
            .zip(specs)
            .map(|(cell, spec)| {
                if let Some(set) = &cell.distinct {
                    return finalize_distinct(set, spec);
                }
                Ok(match spec.kind {
                    AggregateKind::CountStar | AggregateKind::Count => {
                        Value::bigint(cell.count as i64)
                    }
                    AggregateKind::Sum | AggregateKind::Min | AggregateKind::Max => {
                        cell.acc.clone()
                    }
                    AggregateKind::Avg => {
                        if cell.count == 0 {
                            Value::null(LogicalType::Decimal)
                        } else {
                            let sum = cell.acc.as_f64().unwrap_or(0.0);
                            Value::decimal(sum / cell.count as f64)
                        }
                    }
                })
            })
            .collect()
    }
}

fn accumulator_type(spec: &AggregateSpec) -> LogicalType {
    match spec.kind {
        AggregateKind::Avg => LogicalType::Decimal,
        _ => spec.output_ty,
    }
}

fn advance_cell(cell: &mut AggCell, spec: &AggregateSpec, v: &Value) -> Result<()> {
    match spec.kind {
        AggregateKind::CountStar => unreachable!("handled by the caller"),
        AggregateKind::Count => cell.count += 1,
        AggregateKind::Sum | AggregateKind::Avg => {
            let promoted = cast::cast(v, accumulator_type(spec))?;
            cell.acc = if cell.acc.is_null() {
                promoted
            } else {
                arithmetic::evaluate(ArithOp::Add, &cell.acc, &promoted)?
            };
            cell.count += 1;
        }
        AggregateKind::Min => {
            if cell.acc.is_null() || compare_for_sort(v, &cell.acc) == Ordering::Less {
                cell.acc = v.clone();
            }
        }
        AggregateKind::Max => {
            if cell.acc.is_null() || compare_for_sort(v, &cell.acc) == Ordering::Greater {
                cell.acc = v.clone();
            }
        }
    }
    Ok(())
}

fn combine(spec: &AggregateSpec, a: &Value, b: &Value) -> Result<Value> {
    match spec.kind {
        AggregateKind::Sum | AggregateKind::Avg => arithmetic::evaluate(ArithOp::Add, a, b),
        AggregateKind::Min => Ok(if compare_for_sort(b, a) == Ordering::Less {
            b.clone()
        } else {
            a.clone()
        }),
        AggregateKind::Max => Ok(if compare_for_sort(b, a) == Ordering::Greater {
            b.clone()
        } else {
            a.clone()
        }),
        AggregateKind::Count | AggregateKind::CountStar => Ok(a.clone()),
    }
}

fn finalize_distinct(set: &DistinctSet, spec: &AggregateSpec) -> Result<Value> {
    let mut count: u64 = 0;
    let mut acc = Value::null(accumulator_type(spec));
    set.for_each(|v| {
        count += 1;
        match spec.kind {
            AggregateKind::Count | AggregateKind::CountStar => {}
            AggregateKind::Sum | AggregateKind::Avg => {
                let promoted = cast::cast(v, accumulator_type(spec))?;
                acc = if acc.is_null() {
                    promoted
                } else {
                    arithmetic::evaluate(ArithOp::Add, &acc, &promoted)?
                };
            }
            AggregateKind::Min => {
                if acc.is_null() || compare_for_sort(v, &acc) == Ordering::Less {
                    acc = v.clone();
                }
            }
            AggregateKind::Max => {
                if acc.is_null() || compare_for_sort(v, &acc) == Ordering::Greater {
                    acc = v.clone();
                }
            }
        }
        Ok(())
    })?;
    Ok(match spec.kind {
        AggregateKind::Count | AggregateKind::CountStar => Value::bigint(count as i64),
        AggregateKind::Sum | AggregateKind::Min | AggregateKind::Max => acc,
        AggregateKind::Avg => {
            if count == 0 {
                Value::null(LogicalType::Decimal)
            } else {
                Value::decimal(acc.as_f64().unwrap_or(0.0) / count as f64)
            }
        }
    })
}
