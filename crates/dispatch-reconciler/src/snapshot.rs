use std::collections::{HashMap, HashSet};

use crate::source::Keyed;

/// Last applied copy of a collection, keyed by identity.
#[derive(Debug, Clone)]
pub struct Snapshot<T: Keyed> {
    items: Vec<T>,
    keys: HashSet<T::Key>,
}

impl<T: Keyed + Clone> Snapshot<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            keys: HashSet::new(),
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.keys.contains(key)
    }

    /// Replaces the snapshot with `fetched` and returns the items whose keys
    /// were absent from the previous snapshot. Departures are not reported.
    pub fn replace(&mut self, fetched: Vec<T>) -> Vec<T> {
        let current = dedupe_by_key(fetched);
        let newly_appeared = current
            .iter()
            .filter(|item| !self.keys.contains(&item.key()))
            .cloned()
            .collect();
        self.keys = current.iter().map(Keyed::key).collect();
        self.items = current;
        newly_appeared
    }
}

impl<T: Keyed + Clone> Default for Snapshot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapses duplicate keys. The later item wins but keeps the position of
/// the first occurrence.
pub fn dedupe_by_key<T: Keyed>(items: Vec<T>) -> Vec<T> {
    let mut positions: HashMap<T::Key, usize> = HashMap::with_capacity(items.len());
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let key = item.key();
        match positions.get(&key) {
            Some(&index) => unique[index] = item,
            None => {
                positions.insert(key, unique.len());
                unique.push(item);
            }
        }
    }
    unique
}
