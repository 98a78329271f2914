use std::collections::{BTreeMap, BTreeSet};

/// A single secondary index over a table, mapping an index key to the set of
/// primary keys (ids) that currently carry that value.
///
/// Generic over the key type so the same implementation backs both the
/// `state` index (keyed by a small integer state code) and the
/// `last_updated` index (keyed by a Unix timestamp) on every table.
#[derive(Clone, Debug)]
pub struct SecondaryIndex<K: Ord + Clone> {
    map: BTreeMap<K, BTreeSet<String>>,
}

impl<K: Ord + Clone> Default for SecondaryIndex<K> {
    fn default() -> Self {
        Self { map: BTreeMap::new() }
    }
}

impl<K: Ord + Clone> SecondaryIndex<K> {
    pub fn insert(&mut self, key: K, id: String) {
        self.map.entry(key).or_default().insert(id);
    }

    pub fn remove(&mut self, key: &K, id: &str) {
        if let Some(ids) = self.map.get_mut(key) {
            ids.remove(id);
            if ids.is_empty() {
                self.map.remove(key);
            }
        }
    }

    /// All ids whose indexed value equals `key`, in unspecified order.
    pub fn get<'a>(&'a self, key: &K) -> impl Iterator<Item = &'a String> + 'a {
        self.map.get(key).into_iter().flatten()
    }

    /// All ids whose indexed value is `<= key`, visited in descending key
    /// order. Used for "stale since" scans by the reaper.
    pub fn reverse_lower_bound<'a>(&'a self, key: &K) -> impl Iterator<Item = &'a String> + 'a {
        self.map.range(..=key.clone()).rev().flat_map(|(_, ids)| ids.iter())
    }
}
