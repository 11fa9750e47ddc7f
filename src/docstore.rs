use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::errors::BackendError;
use crate::query::{Filter, Query};

pub mod mock;
mod postgres;

pub use self::postgres::PgDocumentStore;

/// The body of a stored document.
pub type Fields = Map<String, Value>;

/// A document together with the ID its store assigned.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub fields: Fields,
}

impl Snapshot {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Snapshot {
            id: id.into(),
            fields,
        }
    }

    /// The document as a single JSON object, with the ID under `id`.
    pub fn into_value(self) -> Value {
        let mut fields = self.fields;
        fields.insert("id".to_owned(), Value::String(self.id));

        Value::Object(fields)
    }
}

/// Looks up a field by a dot-separated path such as `address.city`.
pub fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

/// The operations the services need from a managed document database.
/// Documents live in named collections and are addressed by string IDs
/// the store generates.
pub trait DocumentStore: Send + Sync {
    /// Stores a new document and returns its generated ID.
    fn add(&self, collection: &str, fields: Fields) -> BoxFuture<Result<String, BackendError>>;

    fn get(&self, collection: &str, id: &str) -> BoxFuture<Result<Option<Snapshot>, BackendError>>;

    /// Overwrites the given top-level fields of an existing document,
    /// leaving the others alone. Returns `false`, having written nothing,
    /// if the document doesn't exist.
    fn update(&self, collection: &str, id: &str, fields: Fields) -> BoxFuture<Result<bool, BackendError>>;

    fn delete(&self, collection: &str, id: &str) -> BoxFuture<Result<(), BackendError>>;

    fn query(&self, collection: &str, query: &Query) -> BoxFuture<Result<Vec<Snapshot>, BackendError>>;

    fn count(&self, collection: &str, filters: &[Filter]) -> BoxFuture<Result<u64, BackendError>>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn lookup_follows_nested_paths() {
        let fields = match json!({"address": {"city": "Pune"}, "name": "x"}) {
            Value::Object(fields) => fields,
            _ => unreachable!(),
        };

        assert_eq!(lookup(&fields, "name"), Some(&json!("x")));
        assert_eq!(lookup(&fields, "address.city"), Some(&json!("Pune")));
        assert_eq!(lookup(&fields, "address.zipCode"), None);
        assert_eq!(lookup(&fields, "name.first"), None);
    }

    #[test]
    fn into_value_includes_id() {
        let snapshot = Snapshot::new("7", Fields::new());

        assert_eq!(snapshot.into_value(), json!({"id": "7"}));
    }
}
