//! Entity records on whichever backend the selector picked.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::docstore::{DocumentStore, Fields, Snapshot};
use crate::errors::BackendError;
use crate::query::{Criteria, Filter, Listing};
use crate::slug::slugify;

pub mod managed;
pub mod memory;

pub use self::memory::MemoryStore;

/// Fields that belong to the store or the record's history and can't
/// be changed by an update.
const IMMUTABLE_FIELDS: [&str; 4] = ["id", "slug", "createdAt", "createdBy"];

/// The storage chosen for one service call.
#[derive(Clone)]
pub enum Backend {
    Managed(Arc<dyn DocumentStore>),
    InProcess(Arc<MemoryStore>),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Managed(_) => "managed",
            Backend::InProcess(_) => "in-process",
        }
    }
}

/// How a type of record is stored and what happens to it on the way in.
pub trait Entity: DeserializeOwned {
    /// Human-readable name, used in error messages.
    const KIND: &'static str;

    const COLLECTION: &'static str;

    /// The field the slug is generated from.
    const NAME_FIELD: &'static str;

    /// Adjusts a new record before it's stored. `now` is the creation
    /// timestamp.
    fn on_create(_fields: &mut Fields, _now: &Value) {}

    /// Adjusts an update before it's applied to `existing`.
    fn on_update(_existing: &Fields, _patch: &mut Fields, _now: &Value) {}
}

/// The records of one entity type on one backend.
pub struct Records<E> {
    backend: Backend,
    entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Records<E> {
    pub fn new(backend: Backend) -> Self {
        Records {
            backend,
            entity: PhantomData,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Stores a new record, filling in its slug, timestamps and authorship.
    /// Slugs aren't checked for uniqueness.
    pub async fn create(&self, mut fields: Fields, actor: &str) -> Result<E, BackendError> {
        let now = now()?;
        let slug = fields
            .get(E::NAME_FIELD)
            .and_then(Value::as_str)
            .map(slugify)
            .unwrap_or_default();

        fields.remove("id");
        fields.insert("slug".to_owned(), Value::String(slug));
        fields.insert("createdAt".to_owned(), now.clone());
        fields.insert("updatedAt".to_owned(), now.clone());
        fields.insert("createdBy".to_owned(), Value::from(actor));
        fields.insert("updatedBy".to_owned(), Value::from(actor));
        E::on_create(&mut fields, &now);

        let snapshot = match &self.backend {
            Backend::Managed(store) => managed::insert(store.as_ref(), E::COLLECTION, fields).await?,
            Backend::InProcess(store) => store.insert(E::COLLECTION, fields),
        };

        to_entity(snapshot)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<E>, BackendError> {
        self.snapshot(id).await?.map(to_entity).transpose()
    }

    /// The first record with the given slug, in storage order.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<E>, BackendError> {
        self.find(Filter::equals("slug", slug)).await
    }

    pub async fn find(&self, filter: Filter) -> Result<Option<E>, BackendError> {
        let found = match &self.backend {
            Backend::Managed(store) => managed::find(store.as_ref(), E::COLLECTION, filter).await?,
            Backend::InProcess(store) => store.find(E::COLLECTION, &filter),
        };

        found.map(to_entity).transpose()
    }

    /// Shallow-merges `patch` into a record. Returns `None`, having
    /// written nothing, if the record doesn't exist.
    pub async fn update(&self, id: &str, mut patch: Fields, actor: &str) -> Result<Option<E>, BackendError> {
        let existing = match self.snapshot(id).await? {
            Some(existing) => existing,
            None => return Ok(None),
        };

        for field in IMMUTABLE_FIELDS.iter() {
            patch.remove(*field);
        }

        let now = now()?;
        let renamed = match patch.get(E::NAME_FIELD) {
            Some(Value::String(name)) if existing.fields.get(E::NAME_FIELD) != patch.get(E::NAME_FIELD) => {
                Some(slugify(name))
            }
            _ => None,
        };

        if let Some(slug) = renamed {
            patch.insert("slug".to_owned(), Value::String(slug));
        }

        E::on_update(&existing.fields, &mut patch, &now);
        patch.insert("updatedAt".to_owned(), now);
        patch.insert("updatedBy".to_owned(), Value::from(actor));

        let merged = match &self.backend {
            Backend::Managed(store) => managed::merge(store.as_ref(), E::COLLECTION, id, patch).await?,
            Backend::InProcess(store) => store.merge(E::COLLECTION, id, patch),
        };

        merged.map(to_entity).transpose()
    }

    /// Returns whether there was a record to delete.
    pub async fn delete(&self, id: &str) -> Result<bool, BackendError> {
        match &self.backend {
            Backend::Managed(store) => managed::remove(store.as_ref(), E::COLLECTION, id).await,
            Backend::InProcess(store) => Ok(store.remove(E::COLLECTION, id)),
        }
    }

    pub async fn list(&self, criteria: &Criteria) -> Result<Listing<E>, BackendError> {
        let listing = match &self.backend {
            Backend::Managed(store) => managed::list(store.as_ref(), E::COLLECTION, criteria).await?,
            Backend::InProcess(store) => store.list(E::COLLECTION, criteria),
        };

        listing.try_map(to_entity)
    }

    /// Every record in the collection, in storage order.
    pub async fn scan(&self) -> Result<Vec<E>, BackendError> {
        let snapshots = match &self.backend {
            Backend::Managed(store) => managed::scan(store.as_ref(), E::COLLECTION).await?,
            Backend::InProcess(store) => store.scan(E::COLLECTION),
        };

        snapshots.into_iter().map(to_entity).collect()
    }

    async fn snapshot(&self, id: &str) -> Result<Option<Snapshot>, BackendError> {
        match &self.backend {
            Backend::Managed(store) => managed::get(store.as_ref(), E::COLLECTION, id).await,
            Backend::InProcess(store) => Ok(store.get(E::COLLECTION, id)),
        }
    }
}

/// The current time as an RFC 3339 string value.
pub fn now() -> Result<Value, BackendError> {
    Ok(Value::String(OffsetDateTime::now_utc().format(&Rfc3339)?))
}

/// Serializes a request into the fields it sets. `None` options
/// marked `skip_serializing_if` simply don't appear.
pub fn to_fields(value: &impl Serialize) -> Result<Fields, BackendError> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(BackendError::BadRequest),
    }
}

fn to_entity<E: DeserializeOwned>(snapshot: Snapshot) -> Result<E, BackendError> {
    Ok(serde_json::from_value(snapshot.into_value())?)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::docstore::mock::MockDocumentStore;
    use crate::query::{Order, Page, Search, SortKind, SortOrder};

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Venue {
        id: String,
        name: String,
        slug: String,
        #[serde(default)]
        seats: Option<u32>,
        created_at: String,
        updated_at: String,
        created_by: String,
        updated_by: String,
    }

    impl Entity for Venue {
        const KIND: &'static str = "Venue";
        const COLLECTION: &'static str = "venues";
        const NAME_FIELD: &'static str = "name";
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(fields) => fields,
            _ => unreachable!(),
        }
    }

    fn backends() -> Vec<Backend> {
        vec![
            Backend::Managed(Arc::new(MockDocumentStore::new())),
            Backend::InProcess(Arc::new(MemoryStore::new())),
        ]
    }

    #[tokio::test]
    async fn create_stamps_slug_and_authorship() {
        for backend in backends() {
            let records = Records::<Venue>::new(backend);
            let venue = records
                .create(fields(json!({"name": "The Blue Room", "seats": 80})), "user-1")
                .await
                .expect("create venue");

            assert_eq!(venue.slug, "the-blue-room");
            assert_eq!(venue.created_at, venue.updated_at);
            assert_eq!(venue.created_by, "user-1");
            assert_eq!(venue.updated_by, "user-1");
            assert_eq!(records.get_by_id(&venue.id).await.expect("get venue"), Some(venue));
        }
    }

    #[tokio::test]
    async fn update_regenerates_slug_only_on_rename() {
        for backend in backends() {
            let records = Records::<Venue>::new(backend);
            let venue = records
                .create(fields(json!({"name": "Old Hall"})), "user-1")
                .await
                .expect("create venue");

            let same_name = records
                .update(&venue.id, fields(json!({"name": "Old Hall", "slug": "custom", "seats": 10})), "user-2")
                .await
                .expect("update venue")
                .expect("venue exists");
            assert_eq!(same_name.slug, "old-hall");
            assert_eq!(same_name.seats, Some(10));
            assert_eq!(same_name.created_by, "user-1");
            assert_eq!(same_name.updated_by, "user-2");

            let renamed = records
                .update(&venue.id, fields(json!({"name": "New Hall", "createdAt": "1999-01-01T00:00:00Z"})), "user-3")
                .await
                .expect("update venue")
                .expect("venue exists");
            assert_eq!(renamed.slug, "new-hall");
            assert_eq!(renamed.created_at, venue.created_at);
            assert_eq!(records.get_by_slug("new-hall").await.expect("get by slug"), Some(renamed));
        }
    }

    #[tokio::test]
    async fn missing_records_are_not_written() {
        let store = Arc::new(MockDocumentStore::new());
        let records = Records::<Venue>::new(Backend::Managed(store.clone()));

        let updated = records
            .update("no-such-id", fields(json!({"name": "Ghost"})), "user-1")
            .await
            .expect("update venue");
        assert_eq!(updated, None);
        assert_eq!(store.len("venues"), 0);
        assert!(!records.delete("no-such-id").await.expect("delete venue"));

        let memory = Records::<Venue>::new(Backend::InProcess(Arc::new(MemoryStore::new())));
        assert_eq!(memory.update("1", Fields::new(), "user-1").await.expect("update venue"), None);
        assert!(!memory.delete("1").await.expect("delete venue"));
    }

    #[tokio::test]
    async fn records_deleted_before_the_merge_are_not_found() {
        let store = Arc::new(MockDocumentStore::new());
        let records = Records::<Venue>::new(Backend::Managed(store.clone()));
        let venue = records
            .create(fields(json!({"name": "Closing Down"})), "user-1")
            .await
            .expect("create venue");

        store.delete("venues", &venue.id).await.expect("delete venue");

        let merged = managed::merge(store.as_ref(), "venues", &venue.id, fields(json!({"seats": 5})))
            .await
            .expect("merge venue");
        assert_eq!(merged, None);
        assert_eq!(store.len("venues"), 0);
    }

    #[tokio::test]
    async fn listings_agree_across_backends() {
        let mut listings = Vec::new();

        for backend in backends() {
            let records = Records::<Venue>::new(backend);

            for n in 0..12u32 {
                let name = if n % 3 == 0 { format!("Jazz Club {}", n) } else { format!("Hall {}", n) };
                let seats = if n % 4 == 0 { json!(null) } else { json!(n * 10 % 70) };

                records
                    .create(fields(json!({"name": name, "seats": seats})), "user-1")
                    .await
                    .expect("create venue");
            }

            let by_seats = Order {
                field: "seats",
                kind: SortKind::Number,
                direction: SortOrder::Asc,
            };
            let plain = Criteria {
                filters: Vec::new(),
                search: None,
                order: by_seats,
                page: Page::new(Some(2), Some(5)),
            };
            let searching = Criteria {
                search: Search::new("jazz", &["name"]),
                page: Page::new(Some(1), Some(3)),
                ..plain.clone()
            };

            let names = |listing: Listing<Venue>| {
                (
                    listing.items.into_iter().map(|v| v.name).collect::<Vec<_>>(),
                    listing.pagination,
                )
            };

            listings.push((
                names(records.list(&plain).await.expect("list venues")),
                names(records.list(&searching).await.expect("search venues")),
            ));
        }

        assert_eq!(listings[0], listings[1]);

        let ((_, plain), (searched, search_pagination)) = &listings[0];
        assert_eq!(plain.total_items, 12);
        assert_eq!(plain.total_pages, 3);
        assert_eq!(search_pagination.total_items, 4);
        assert!(searched.iter().all(|name| name.starts_with("Jazz Club")));
    }
}
