//! A builder-side table that reuses an entry's index on repeat insertion
//! instead of growing without bound.
//!
//! Small tables are scanned linearly - cheaper than hashing for the
//! handful of keys a typical layer has. Once a table crosses
//! [`LINEAR_SCAN_THRESHOLD`] entries, insertion switches to a hash index
//! built from the existing entries, and every later insertion maintains it.

use std::collections::HashMap;
use std::hash::Hash;

use crate::types::IndexValue;

const LINEAR_SCAN_THRESHOLD: usize = 20;

pub(crate) struct DedupTable<K> {
    entries: Vec<K>,
    index: Option<HashMap<K, u32>>,
}

impl<K: Eq + Hash + Clone> DedupTable<K> {
    pub fn new() -> Self {
        Self { entries: Vec::new(), index: None }
    }

    /// Return the existing index for `key`, or append it and return its
    /// new index.
    pub fn get_or_insert(&mut self, key: K) -> IndexValue {
        if let Some(map) = &self.index {
            if let Some(&idx) = map.get(&key) {
                return IndexValue::new(idx);
            }
        } else if let Some(pos) = self.entries.iter().position(|e| *e == key) {
            return IndexValue::new(pos as u32);
        }

        let idx = self.entries.len() as u32;
        self.entries.push(key.clone());

        match &mut self.index {
            Some(map) => {
                map.insert(key, idx);
            }
            None if self.entries.len() > LINEAR_SCAN_THRESHOLD => {
                let map = self.entries.iter().cloned().zip(0u32..).collect();
                self.index = Some(map);
            }
            None => {}
        }

        IndexValue::new(idx)
    }

    pub fn entries(&self) -> &[K] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_insertion_reuses_the_same_index() {
        let mut table: DedupTable<String> = DedupTable::new();
        let a = table.get_or_insert("a".to_string());
        let b = table.get_or_insert("b".to_string());
        let a_again = table.get_or_insert("a".to_string());
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn crossing_the_threshold_still_dedups_correctly() {
        let mut table: DedupTable<u64> = DedupTable::new();
        for i in 0..50u64 {
            table.get_or_insert(i);
        }
        for i in 0..50u64 {
            assert_eq!(table.get_or_insert(i), IndexValue::new(i as u32));
        }
        assert_eq!(table.len(), 50);
    }
}
