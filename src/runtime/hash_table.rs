// Hash table used by hash-join and hash-aggregation. The directory is open
// addressed on the low hash bits; colliding entries chain off their home
// bucket. Keys are value tuples compared structurally, so callers normalize
// key values to a common type before insertion.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

use crate::types::Value;

const INITIAL_BUCKETS: usize = 256;
const MAX_LOAD_NUM: usize = 3;
const MAX_LOAD_DEN: usize = 4;

pub fn hash_values(values: &[Value]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write_usize(values.len());
    for v in values {
        v.hash_into(&mut hasher);
    }
    hasher.finish()
}

struct Entry<V> {
    hash: u64,
    key: Vec<Value>,
    value: V,
    next: Option<Box<Entry<V>>>,
}

pub struct OaHashTable<V> {
    directory: Vec<Option<Box<Entry<V>>>>,
    len: usize,
}

impl<V> OaHashTable<V> {
    pub fn new() -> Self {
        Self::with_buckets(INITIAL_BUCKETS)
    }

    fn with_buckets(buckets: usize) -> Self {
        debug_assert!(buckets.is_power_of_two());
        Self { directory: (0..buckets).map(|_| None).collect(), len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rough bytes held, for scratch-memory accounting.
    pub fn memory_estimate(&self) -> usize {
        self.directory.len() * std::mem::size_of::<Option<Box<Entry<V>>>>()
            + self.len * (std::mem::size_of::<Entry<V>>() + 64)
    }

    fn bucket(&self, hash: u64) -> usize {
        (hash as usize) & (self.directory.len() - 1)
    }

    pub fn probe(&self, hash: u64, key: &[Value]) -> Option<&V> {
        let mut cursor = self.directory[self.bucket(hash)].as_deref();
        while let Some(entry) = cursor {
            if entry.hash == hash && entry.key == key {
                return Some(&entry.value);
            }
            cursor = entry.next.as_deref();
        }
        None
    }

    /// Probe-or-insert: returns the value cell for `key`, installing
    /// `default()` on first sight.
    pub fn get_or_insert_with(
        &mut self,
        hash: u64,
        key: &[Value],
        default: impl FnOnce() -> V,
    ) -> &mut V {
        self.maybe_grow();
        let bucket = self.bucket(hash);

        // Two-pass to keep the borrow checker satisfied: find first, then
        // re-walk mutably.
        let mut found = false;
        {
            let mut cursor = self.directory[bucket].as_deref();
            while let Some(entry) = cursor {
                if entry.hash == hash && entry.key == key {
                    found = true;
                    break;
                }
                cursor = entry.next.as_deref();
            }
        }
        if !found {
            let head = self.directory[bucket].take();
            let entry = self.directory[bucket].insert(Box::new(Entry {
                hash,
                key: key.to_vec(),
                value: default(),
                next: head,
            }));
            self.len += 1;
            return &mut entry.value;
        }
        let mut cursor = self.directory[bucket].as_deref_mut();
        while let Some(entry) = cursor {
            if entry.hash == hash && entry.key == key {
                return &mut entry.value;
            }
            cursor = entry.next.as_deref_mut();
        }
        unreachable!("entry vanished between passes")
    }

    fn maybe_grow(&mut self) {
        if self.len * MAX_LOAD_DEN < self.directory.len() * MAX_LOAD_NUM {
            return;
        }
        let mut grown = Self::with_buckets(self.directory.len() * 2);
        for head in self.directory.iter_mut() {
            let mut cursor = head.take();
            while let Some(mut entry) = cursor {
                cursor = entry.next.take();
                let bucket = grown.bucket(entry.hash);
                entry.next = grown.directory[bucket].take();
                grown.directory[bucket] = Some(entry);
                grown.len += 1;
            }
        }
        *self = grown;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[Value], &V)> {
        self.directory.iter().flat_map(|head| {
            let mut out = Vec::new();
            let mut cursor = head.as_deref();
            while let Some(entry) = cursor {
                out.push((entry.key.as_slice(), &entry.value));
                cursor = entry.next.as_deref();
            }
            out
        })
    }

    /// Drain all entries, leaving the table empty.
    pub fn drain(&mut self) -> Vec<(Vec<Value>, V)> {
        let mut out = Vec::with_capacity(self.len);
        for head in self.directory.iter_mut() {
            let mut cursor = head.take();
            while let Some(entry) = cursor {
                cursor = entry.next;
                out.push((entry.key, entry.value));
            }
        }
        self.len = 0;
        out
    }
}

impl<V> Default for OaHashTable<V> {
    fn default() -> Self {
        Self::new()
    }
}
