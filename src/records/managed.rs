//! Record operations on top of a managed document store.

use crate::docstore::{DocumentStore, Fields, Snapshot};
use crate::errors::BackendError;
use crate::query::{Criteria, Filter, Listing, Pagination, Query};

pub async fn insert(store: &dyn DocumentStore, collection: &str, fields: Fields) -> Result<Snapshot, BackendError> {
    let id = store.add(collection, fields.clone()).await?;

    Ok(Snapshot::new(id, fields))
}

pub async fn get(store: &dyn DocumentStore, collection: &str, id: &str) -> Result<Option<Snapshot>, BackendError> {
    store.get(collection, id).await
}

pub async fn find(store: &dyn DocumentStore, collection: &str, filter: Filter) -> Result<Option<Snapshot>, BackendError> {
    let mut found = store.query(collection, &Query::first(filter)).await?;

    Ok(if found.is_empty() { None } else { Some(found.swap_remove(0)) })
}

/// Merges `patch` into a record the caller has just read and reads the
/// result back. `None` if the record has been deleted in between.
pub async fn merge(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    patch: Fields,
) -> Result<Option<Snapshot>, BackendError> {
    if !store.update(collection, id, patch).await? {
        return Ok(None);
    }

    store.get(collection, id).await
}

pub async fn remove(store: &dyn DocumentStore, collection: &str, id: &str) -> Result<bool, BackendError> {
    if store.get(collection, id).await?.is_none() {
        return Ok(false);
    }

    store.delete(collection, id).await?;

    Ok(true)
}

/// Lists records, letting the store do as much of the work as it can.
/// Text search isn't something the store supports, so when there is
/// one the sorted matches are fetched whole and searched and sliced
/// here.
pub async fn list(store: &dyn DocumentStore, collection: &str, criteria: &Criteria) -> Result<Listing<Snapshot>, BackendError> {
    let query = criteria.to_query();
    let documents = store.query(collection, &query).await?;

    match &criteria.search {
        None => {
            let total_items = store.count(collection, &query.filters).await?;

            Ok(Listing {
                items: documents,
                pagination: Pagination::new(criteria.page, total_items),
            })
        }
        Some(search) => {
            let matched = documents
                .into_iter()
                .filter(|d| search.matches(&d.fields))
                .collect();

            Ok(criteria.paginate(matched))
        }
    }
}

pub async fn scan(store: &dyn DocumentStore, collection: &str) -> Result<Vec<Snapshot>, BackendError> {
    store.query(collection, &Query::default()).await
}
