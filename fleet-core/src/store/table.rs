use std::collections::BTreeMap;
use std::sync::Arc;

use super::index::SecondaryIndex;

/// A record stored in a [`Table`]. Every table in this store carries the
/// same two secondary indexes (`state`, `last_updated`), as required by
/// the entity model, so the trait exposes exactly those alongside the
/// primary key.
pub trait Record: Clone + std::fmt::Debug + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn state_code(&self) -> u8;
    fn last_updated(&self) -> i64;
}

/// A schema-defined table: a primary unique index by id, plus `state` and
/// `last_updated` secondary indexes. One instance of this generic type
/// backs the `agents` table and another backs the `sessions` table.
#[derive(Clone, Debug)]
pub struct Table<R: Record> {
    primary: BTreeMap<String, Arc<R>>,
    by_state: SecondaryIndex<u8>,
    by_last_updated: SecondaryIndex<i64>,
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self {
            primary: BTreeMap::new(),
            by_state: SecondaryIndex::default(),
            by_last_updated: SecondaryIndex::default(),
        }
    }
}

impl<R: Record> Table<R> {
    pub fn first_by_id(&self, id: &str) -> Option<Arc<R>> {
        self.primary.get(id).cloned()
    }

    pub fn get_by_state(&self, state: u8) -> impl Iterator<Item = Arc<R>> + '_ {
        self.by_state.get(&state).filter_map(move |id| self.primary.get(id).cloned())
    }

    /// Records whose `last_updated <= ts`, visited from most-stale-adjacent
    /// (highest timestamp still `<= ts`) down to oldest.
    pub fn reverse_lower_bound_by_last_updated(&self, ts: i64) -> impl Iterator<Item = Arc<R>> + '_ {
        self.by_last_updated
            .reverse_lower_bound(&ts)
            .filter_map(move |id| self.primary.get(id).cloned())
    }

    /// Upsert by primary key. Re-indexes secondary indexes if the record
    /// already existed with a different state/timestamp.
    pub fn insert(&mut self, record: R) {
        let id = record.id().to_string();
        if let Some(old) = self.primary.get(&id) {
            self.by_state.remove(&old.state_code(), &id);
            self.by_last_updated.remove(&old.last_updated(), &id);
        }
        self.by_state.insert(record.state_code(), id.clone());
        self.by_last_updated.insert(record.last_updated(), id.clone());
        self.primary.insert(id, Arc::new(record));
    }

    /// Deletes every record named in `ids` that currently exists, returning
    /// the number actually deleted.
    pub fn delete_all(&mut self, ids: &[String]) -> usize {
        let mut deleted = 0;
        for id in ids {
            if let Some(old) = self.primary.remove(id) {
                self.by_state.remove(&old.state_code(), id);
                self.by_last_updated.remove(&old.last_updated(), id);
                deleted += 1;
            }
        }
        deleted
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }
}
