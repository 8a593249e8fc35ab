// Tuple sorter backing ORDER BY. Tuples are appended to a flat arena with a
// fixed per-tuple width; Sort() runs a median-of-three quicksort with an
// insertion-sort cutoff over an index vector and then gathers the arena
// into sorted order. Top-K mode swaps the arena for a bounded max-heap so
// only the K smallest tuples are ever retained.

use std::cmp::Ordering;
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{DbError, Result};
use crate::types::Value;

pub type TupleComparator = Arc<dyn Fn(&[Value], &[Value]) -> Ordering + Send + Sync>;

const INSERTION_SORT_THRESHOLD: usize = 16;

pub struct TupleSorter {
    width: usize,
    cmp: TupleComparator,
    arena: Vec<Value>,
    /// Max-heap of owned rows when running in top-K mode.
    top_k: Option<TopKHeap>,
    sorted: bool,
}

struct TopKHeap {
    k: usize,
    rows: Vec<Vec<Value>>,
}

impl TupleSorter {
    pub fn new(width: usize, cmp: TupleComparator) -> Result<Self> {
        if width == 0 {
            return Err(DbError::Internal("sorter tuple width must be non-zero".into()));
        }
        Ok(Self { width, cmp, arena: Vec::new(), top_k: None, sorted: false })
    }

    /// Keep only the `k` smallest tuples under the comparator.
    pub fn with_top_k(width: usize, cmp: TupleComparator, k: usize) -> Result<Self> {
        let mut sorter = Self::new(width, cmp)?;
        sorter.top_k = Some(TopKHeap { k, rows: Vec::with_capacity(k.min(4096)) });
        Ok(sorter)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        match &self.top_k {
            Some(heap) => heap.rows.len(),
            None => self.arena.len() / self.width,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn memory_estimate(&self) -> usize {
        let tuples = match &self.top_k {
            Some(heap) => heap.rows.len(),
            None => self.arena.len() / self.width.max(1),
        };
        tuples * self.width * std::mem::size_of::<Value>()
    }

    pub fn append(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.width {
            return Err(DbError::Internal(format!(
                "sorter expected width {}, got {}",
                self.width,
                row.len()
            )));
        }
        self.sorted = false;
        match &mut self.top_k {
            None => self.arena.extend(row),
            Some(heap) => {
                if heap.k == 0 {
                    return Ok(());
                }
                if heap.rows.len() < heap.k {
                    heap.rows.push(row);
                    heap.sift_up(heap.rows.len() - 1, &self.cmp);
                } else if (self.cmp.as_ref())(&row, &heap.rows[0]) == Ordering::Less {
                    // The root is the current maximum; a new row only
                    // enters by evicting it.
                    heap.rows[0] = row;
                    heap.sift_down(0, &self.cmp);
                }
            }
        }
        Ok(())
    }

    /// Sort the collected tuples. Idempotent until the next append.
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }
        if let Some(heap) = self.top_k.take() {
            self.arena = heap.rows.into_iter().flatten().collect();
        }
        let n = self.arena.len() / self.width;
        let mut indices: Vec<u32> = (0..n as u32).collect();
        self.quicksort(&mut indices);
        let mut gathered = Vec::with_capacity(self.arena.len());
        for &i in &indices {
            let start = i as usize * self.width;
            gathered.extend_from_slice(&self.arena[start..start + self.width]);
        }
        self.arena = gathered;
        self.sorted = true;
    }

    /// Iterate tuples in comparator order. Only meaningful after sort().
    pub fn iter(&self) -> impl Iterator<Item = &[Value]> {
        self.arena.chunks_exact(self.width)
    }

    fn tuple(&self, index: u32) -> &[Value] {
        let start = index as usize * self.width;
        &self.arena[start..start + self.width]
    }

    fn quicksort(&self, indices: &mut [u32]) {
        let n = indices.len();
        if n <= INSERTION_SORT_THRESHOLD {
            self.insertion_sort(indices);
            return;
        }
        // Median-of-three pivot: order the first, middle and last tuples,
        // then partition around a copy of the middle one.
        let mid = n / 2;
        if (self.cmp.as_ref())(self.tuple(indices[mid]), self.tuple(indices[0])) == Ordering::Less {
            indices.swap(mid, 0);
        }
        if (self.cmp.as_ref())(self.tuple(indices[n - 1]), self.tuple(indices[0])) == Ordering::Less {
            indices.swap(n - 1, 0);
        }
        if (self.cmp.as_ref())(self.tuple(indices[n - 1]), self.tuple(indices[mid])) == Ordering::Less {
            indices.swap(n - 1, mid);
        }
        let pivot: Vec<Value> = self.tuple(indices[mid]).to_vec();

        let mut i: isize = -1;
        let mut j: isize = n as isize;
        loop {
            loop {
                i += 1;
                if (self.cmp.as_ref())(self.tuple(indices[i as usize]), &pivot) != Ordering::Less {
                    break;
                }
            }
            loop {
                j -= 1;
                if (self.cmp.as_ref())(self.tuple(indices[j as usize]), &pivot) != Ordering::Greater {
                    break;
                }
            }
            if i >= j {
                break;
            }
            indices.swap(i as usize, j as usize);
        }
        let split = (j + 1) as usize;
        let (lo, hi) = indices.split_at_mut(split);
        self.quicksort(lo);
        self.quicksort(hi);
    }

    fn insertion_sort(&self, indices: &mut [u32]) {
        for i in 1..indices.len() {
            let mut j = i;
            while j > 0
                && (self.cmp.as_ref())(self.tuple(indices[j]), self.tuple(indices[j - 1])) == Ordering::Less
            {
                indices.swap(j, j - 1);
                j -= 1;
            }
        }
    }

    /// Parallel finalization: sort every worker-local run concurrently,
    /// then k-way merge the runs (and anything already collected here)
    /// into this sorter.
    pub fn sort_parallel(&mut self, mut locals: Vec<TupleSorter>) -> Result<()> {
        for local in &locals {
            if local.width != self.width {
                return Err(DbError::Internal("mismatched widths in parallel sort".into()));
            }
        }
        self.sort();
        locals.par_iter_mut().for_each(|s| s.sort());

        let mut runs: Vec<&[Value]> = Vec::with_capacity(locals.len() + 1);
        let own = std::mem::take(&mut self.arena);
        runs.push(&own);
        for local in &locals {
            runs.push(&local.arena);
        }

        let total: usize = runs.iter().map(|r| r.len()).sum();
        let mut merged = Vec::with_capacity(total);
        let mut cursors = vec![0usize; runs.len()];
        loop {
            let mut best: Option<usize> = None;
            for (r, &pos) in cursors.iter().enumerate() {
                if pos >= runs[r].len() {
                    continue;
                }
                let candidate = &runs[r][pos..pos + self.width];
                best = match best {
                    None => Some(r),
                    Some(b) => {
                        let current = &runs[b][cursors[b]..cursors[b] + self.width];
                        if (self.cmp.as_ref())(candidate, current) == Ordering::Less {
                            Some(r)
                        } else {
                            Some(b)
                        }
                    }
                };
            }
            let Some(winner) = best else { break };
            let pos = cursors[winner];
            merged.extend_from_slice(&runs[winner][pos..pos + self.width]);
            cursors[winner] += self.width;
        }
        drop(runs);
        self.arena = merged;
        self.sorted = true;
        Ok(())
    }
}

impl TopKHeap {
    fn sift_up(&mut self, mut idx: usize, cmp: &TupleComparator) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if (cmp.as_ref())(&self.rows[idx], &self.rows[parent]) == Ordering::Greater {
                self.rows.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize, cmp: &TupleComparator) {
        let n = self.rows.len();
        loop {
            let (l, r) = (idx * 2 + 1, idx * 2 + 2);
            let mut largest = idx;
            if l < n && (cmp.as_ref())(&self.rows[l], &self.rows[largest]) == Ordering::Greater {
                largest = l;
            }
            if r < n && (cmp.as_ref())(&self.rows[r], &self.rows[largest]) == Ordering::Greater {
                largest = r;
            }
            if largest == idx {
                break;
            }
            self.rows.swap(idx, largest);
            idx = largest;
        }
    }
}
