//! Index table
//!
//! Ordered in-memory key → offset map rebuilt from the snapshot and log.

use std::collections::BTreeMap;

use super::IndexOperation;

/// In-memory ordered map of every live key
#[derive(Debug, Default, Clone)]
pub struct IndexTable {
    data: BTreeMap<String, i64>,
}

impl IndexTable {
    pub fn from_map(data: BTreeMap<String, i64>) -> Self {
        Self { data }
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.data.get(key).copied()
    }

    /// Returns the previous offset, if any
    pub fn put(&mut self, key: String, offset: i64) -> Option<i64> {
        self.data.insert(key, offset)
    }

    pub fn delete(&mut self, key: &str) -> Option<i64> {
        self.data.remove(key)
    }

    /// Replay a logged mutation
    pub fn apply(&mut self, operation: IndexOperation) {
        match operation {
            IndexOperation::Put { key, offset } => {
                self.data.insert(key, offset);
            }
            IndexOperation::Delete { key } => {
                self.data.remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> + '_ {
        self.data.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}
