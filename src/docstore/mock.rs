//! An in-memory stand-in for the managed document store, for tests
//! that need the managed code path without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::{BoxFuture, FutureExt};
use uuid::Uuid;

use super::{DocumentStore, Fields, Snapshot};
use crate::errors::BackendError;
use crate::query::{Filter, Query};
use crate::selector::Connector;

#[derive(Default)]
pub struct MockDocumentStore {
    collections: RwLock<HashMap<String, Vec<Snapshot>>>,
    failing: AtomicBool,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        MockDocumentStore::default()
    }

    /// Makes every later operation fail, as a broken connection would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map_or(0, Vec::len)
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::store("mock document store is failing"));
        }

        Ok(())
    }

    fn documents(&self, collection: &str) -> Vec<Snapshot> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

impl DocumentStore for MockDocumentStore {
    fn add(&self, collection: &str, fields: Fields) -> BoxFuture<Result<String, BackendError>> {
        let collection = collection.to_owned();

        async move {
            self.check()?;

            let id = Uuid::new_v4().to_string();
            self.collections
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(collection)
                .or_default()
                .push(Snapshot::new(id.clone(), fields));

            Ok(id)
        }
        .boxed()
    }

    fn get(&self, collection: &str, id: &str) -> BoxFuture<Result<Option<Snapshot>, BackendError>> {
        let collection = collection.to_owned();
        let id = id.to_owned();

        async move {
            self.check()?;

            Ok(self.documents(&collection).into_iter().find(|d| d.id == id))
        }
        .boxed()
    }

    fn update(&self, collection: &str, id: &str, fields: Fields) -> BoxFuture<Result<bool, BackendError>> {
        let collection = collection.to_owned();
        let id = id.to_owned();

        async move {
            self.check()?;

            let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
            let document = collections
                .get_mut(&collection)
                .and_then(|documents| documents.iter_mut().find(|d| d.id == id));

            match document {
                Some(document) => {
                    document.fields.extend(fields);
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        .boxed()
    }

    fn delete(&self, collection: &str, id: &str) -> BoxFuture<Result<(), BackendError>> {
        let collection = collection.to_owned();
        let id = id.to_owned();

        async move {
            self.check()?;

            if let Some(documents) = self
                .collections
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .get_mut(&collection)
            {
                documents.retain(|d| d.id != id);
            }

            Ok(())
        }
        .boxed()
    }

    fn query(&self, collection: &str, query: &Query) -> BoxFuture<Result<Vec<Snapshot>, BackendError>> {
        let collection = collection.to_owned();
        let query = query.clone();

        async move {
            self.check()?;

            Ok(query.apply(self.documents(&collection)))
        }
        .boxed()
    }

    fn count(&self, collection: &str, filters: &[Filter]) -> BoxFuture<Result<u64, BackendError>> {
        let collection = collection.to_owned();
        let filters = filters.to_vec();

        async move {
            self.check()?;

            let count = self
                .documents(&collection)
                .iter()
                .filter(|d| filters.iter().all(|f| f.matches(&d.fields)))
                .count();

            Ok(count as u64)
        }
        .boxed()
    }
}

/// A connector whose store can be switched on and off at runtime.
pub struct MockConnector {
    store: Arc<MockDocumentStore>,
    available: AtomicBool,
}

impl MockConnector {
    pub fn new(store: Arc<MockDocumentStore>, available: bool) -> Self {
        MockConnector {
            store,
            available: AtomicBool::new(available),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn store(&self) -> &Arc<MockDocumentStore> {
        &self.store
    }
}

impl Connector for MockConnector {
    fn connect(&self) -> BoxFuture<Result<Arc<dyn DocumentStore>, BackendError>> {
        async move {
            if self.available.load(Ordering::SeqCst) {
                Ok(self.store.clone() as Arc<dyn DocumentStore>)
            } else {
                Err(BackendError::StoreUnavailable {
                    reason: "mock document store is switched off".to_owned(),
                })
            }
        }
        .boxed()
    }
}
