//! Key → row position cache

use std::collections::HashMap;
use std::hash::Hash;

use crate::domain::{Row, RowStore};

/// Lazily built map from a row key to its position in a store
///
/// Hits are checked against the store before use; a stale or missing
/// key triggers one full rebuild.
#[derive(Debug)]
pub struct RowIndex<K> {
    positions: HashMap<K, usize>,
    valid: bool,
}

impl<K> Default for RowIndex<K> {
    fn default() -> Self {
        Self {
            positions: HashMap::new(),
            valid: false,
        }
    }
}

impl<K: Eq + Hash + Clone> RowIndex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all positions; the next lookup rebuilds
    pub fn invalidate(&mut self) {
        self.positions.clear();
        self.valid = false;
    }

    /// Record a row appended at `index`
    pub fn record(&mut self, key: K, index: usize) {
        if self.valid {
            self.positions.insert(key, index);
        }
    }

    pub fn lookup(
        &mut self,
        store: &dyn RowStore,
        key: &K,
        key_of: impl Fn(&Row) -> Option<K>,
    ) -> Option<usize> {
        if self.valid {
            if let Some(&index) = self.positions.get(key) {
                if store.row(index).and_then(&key_of).as_ref() == Some(key) {
                    return Some(index);
                }
            }
        }
        self.rebuild(store, &key_of);
        self.positions.get(key).copied()
    }

    fn rebuild(&mut self, store: &dyn RowStore, key_of: &impl Fn(&Row) -> Option<K>) {
        self.positions.clear();
        for index in 0..store.row_count() {
            if let Some(key) = store.row(index).and_then(key_of) {
                self.positions.entry(key).or_insert(index);
            }
        }
        self.valid = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnInfo, ColumnType, Origin, Value};
    use crate::infrastructure::InMemoryRowStore;

    fn key_of(row: &Row) -> Option<i64> {
        row.get("id").as_i64()
    }

    fn store(ids: &[i64]) -> InMemoryRowStore {
        let mut store =
            InMemoryRowStore::new("t", vec![ColumnInfo::new("id", ColumnType::Integer)]);
        for &id in ids {
            store
                .insert_row(Row::new().with("id", id), false, Origin::Load)
                .unwrap();
        }
        store
    }

    #[test]
    fn test_lookup_builds_lazily() {
        let store = store(&[5, 3, 9]);
        let mut index = RowIndex::new();

        assert_eq!(index.lookup(&store, &9, key_of), Some(2));
        assert_eq!(index.lookup(&store, &4, key_of), None);
    }

    #[test]
    fn test_stale_position_is_detected() {
        let mut store = store(&[5, 3, 9]);
        let mut index = RowIndex::new();
        assert_eq!(index.lookup(&store, &9, key_of), Some(2));

        store.delete_row(0, false, Origin::External).unwrap();

        assert_eq!(index.lookup(&store, &9, key_of), Some(1));
        assert_eq!(store.row(1).unwrap().get("id"), &Value::Int(9));
    }

    #[test]
    fn test_record_after_append() {
        let mut store = store(&[1]);
        let mut index = RowIndex::new();
        index.lookup(&store, &1, key_of);

        let at = store
            .insert_row(Row::new().with("id", 2), false, Origin::Persistence)
            .unwrap();
        index.record(2, at);

        assert_eq!(index.lookup(&store, &2, key_of), Some(1));
    }
}
