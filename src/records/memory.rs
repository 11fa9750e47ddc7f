use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::docstore::{Fields, Snapshot};
use crate::query::{Criteria, Filter, Listing};

/// The fallback store used while the managed document store is
/// unavailable. Contents last as long as the process.
///
/// Every access, reads included, goes through one lock, so IDs are
/// never handed out twice and concurrent updates don't lose writes.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    last_id: u64,
    collections: HashMap<String, Vec<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // the state is only ever mutated in single statements, so a
        // panicking holder can't leave it half-written
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a new record under the next ID.
    pub fn insert(&self, collection: &str, fields: Fields) -> Snapshot {
        let mut state = self.lock();
        state.last_id += 1;

        let snapshot = Snapshot::new(state.last_id.to_string(), fields);
        state
            .collections
            .entry(collection.to_owned())
            .or_default()
            .push(snapshot.clone());

        snapshot
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Snapshot> {
        self.lock()
            .collections
            .get(collection)?
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    /// The first record in storage order that matches `filter`.
    pub fn find(&self, collection: &str, filter: &Filter) -> Option<Snapshot> {
        self.lock()
            .collections
            .get(collection)?
            .iter()
            .find(|s| filter.matches(&s.fields))
            .cloned()
    }

    /// Overwrites the given top-level fields of a record and returns the
    /// result, or `None` if there's no such record.
    pub fn merge(&self, collection: &str, id: &str, patch: Fields) -> Option<Snapshot> {
        let mut state = self.lock();
        let snapshot = state
            .collections
            .get_mut(collection)?
            .iter_mut()
            .find(|s| s.id == id)?;

        snapshot.fields.extend(patch);

        Some(snapshot.clone())
    }

    /// Returns whether there was a record to remove.
    pub fn remove(&self, collection: &str, id: &str) -> bool {
        let mut state = self.lock();

        match state.collections.get_mut(collection) {
            Some(snapshots) => {
                let before = snapshots.len();
                snapshots.retain(|s| s.id != id);
                snapshots.len() != before
            }
            None => false,
        }
    }

    pub fn list(&self, collection: &str, criteria: &Criteria) -> Listing<Snapshot> {
        let state = self.lock();
        let snapshots = state.collections.get(collection).into_iter().flatten().cloned();

        criteria.run(snapshots)
    }

    pub fn scan(&self, collection: &str) -> Vec<Snapshot> {
        self.lock()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}
