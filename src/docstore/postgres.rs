//! A document store kept in a single PostgreSQL table, one JSONB
//! value per document. See `migrations/` for the schema.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgRow, Postgres};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Row};
use uuid::Uuid;

use super::{DocumentStore, Fields, Snapshot};
use crate::errors::{map_sqlx_error, BackendError};
use crate::query::{Filter, Order, Query, SortKind, SortOrder};

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        PgDocumentStore { pool }
    }
}

// these can be simplified once async functions in traits are stabilized
impl DocumentStore for PgDocumentStore {
    fn add(&self, collection: &str, fields: Fields) -> BoxFuture<Result<String, BackendError>> {
        let collection = collection.to_owned();

        async move {
            let id = Uuid::new_v4().to_string();

            sqlx::query(include_str!("queries/insert_document.sql"))
                .bind(&collection)
                .bind(&id)
                .bind(Json(Value::Object(fields)))
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            Ok(id)
        }
        .boxed()
    }

    fn get(&self, collection: &str, id: &str) -> BoxFuture<Result<Option<Snapshot>, BackendError>> {
        let collection = collection.to_owned();
        let id = id.to_owned();

        async move {
            let row = sqlx::query(include_str!("queries/retrieve_document.sql"))
                .bind(&collection)
                .bind(&id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            row.map(|r| to_snapshot(&r)).transpose()
        }
        .boxed()
    }

    fn update(&self, collection: &str, id: &str, fields: Fields) -> BoxFuture<Result<bool, BackendError>> {
        let collection = collection.to_owned();
        let id = id.to_owned();

        async move {
            let result = sqlx::query(include_str!("queries/merge_document.sql"))
                .bind(&collection)
                .bind(&id)
                .bind(Json(Value::Object(fields)))
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            Ok(result.rows_affected() > 0)
        }
        .boxed()
    }

    fn delete(&self, collection: &str, id: &str) -> BoxFuture<Result<(), BackendError>> {
        let collection = collection.to_owned();
        let id = id.to_owned();

        async move {
            sqlx::query(include_str!("queries/delete_document.sql"))
                .bind(&collection)
                .bind(&id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            Ok(())
        }
        .boxed()
    }

    fn query(&self, collection: &str, query: &Query) -> BoxFuture<Result<Vec<Snapshot>, BackendError>> {
        let collection = collection.to_owned();
        let query = query.clone();

        async move {
            let rows = select_documents(collection, &query)
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            rows.iter().map(to_snapshot).collect()
        }
        .boxed()
    }

    fn count(&self, collection: &str, filters: &[Filter]) -> BoxFuture<Result<u64, BackendError>> {
        let collection = collection.to_owned();
        let filters = filters.to_vec();

        async move {
            let row = count_documents(collection, &filters)
                .build()
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            let count: i64 = row.try_get(0).map_err(map_sqlx_error)?;

            Ok(u64::try_from(count).unwrap_or(0))
        }
        .boxed()
    }
}

fn to_snapshot(row: &PgRow) -> Result<Snapshot, BackendError> {
    let id: String = row.try_get("id").map_err(map_sqlx_error)?;
    let Json(data): Json<Value> = row.try_get("data").map_err(map_sqlx_error)?;

    match data {
        Value::Object(fields) => Ok(Snapshot::new(id, fields)),
        _ => Err(BackendError::store(format!("document {} is not an object", id))),
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn select_documents(collection: String, query: &Query) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT id, data FROM documents WHERE collection = ");
    builder.push_bind(collection);
    push_filters(&mut builder, &query.filters);
    push_order(&mut builder, query.order.as_ref());

    if let Some(limit) = query.limit {
        builder.push(" LIMIT ").push_bind(to_i64(limit));
    }

    if let Some(offset) = query.offset {
        builder.push(" OFFSET ").push_bind(to_i64(offset));
    }

    builder
}

fn count_documents(collection: String, filters: &[Filter]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM documents WHERE collection = ");
    builder.push_bind(collection);
    push_filters(&mut builder, filters);

    builder
}

/// The `#>` path for a dot-separated field name.
fn path(field: &str) -> Vec<String> {
    field.split('.').map(str::to_owned).collect()
}

fn push_filters(builder: &mut QueryBuilder<'static, Postgres>, filters: &[Filter]) {
    for filter in filters {
        builder.push(" AND ");

        match filter {
            Filter::Equals { field, value } => {
                builder
                    .push("data #> ")
                    .push_bind(path(field))
                    .push(" = ")
                    .push_bind(Json(value.clone()));
            }
            Filter::Missing { field } => {
                builder
                    .push("coalesce(data #> ")
                    .push_bind(path(field))
                    .push(", 'null'::jsonb) = 'null'::jsonb");
            }
            Filter::ContainsAny { field, values } => {
                builder
                    .push("jsonb_typeof(data #> ")
                    .push_bind(path(field))
                    .push(") = 'array' AND data #> ")
                    .push_bind(path(field))
                    .push(" ?| ")
                    .push_bind(values.clone());
            }
        }
    }
}

/// The shape of an RFC 3339 timestamp. Strings that don't have it are
/// never cast, so they sort as missing instead of failing the query.
const TIMESTAMP_PATTERN: &str =
    r"^\d{4}-\d{2}-\d{2}[Tt]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:\d{2})$";

// values of the wrong JSON type count as missing, missing values sort
// lowest, and `seq` keeps ties in insertion order
fn push_order(builder: &mut QueryBuilder<'static, Postgres>, order: Option<&Order>) {
    builder.push(" ORDER BY ");

    if let Some(order) = order {
        let (json_type, cast) = match order.kind {
            SortKind::Text => ("string", ") COLLATE \"C\""),
            SortKind::Number => ("number", ")::numeric"),
            SortKind::Timestamp => ("string", ")::timestamptz"),
        };

        builder
            .push("(CASE WHEN jsonb_typeof(data #> ")
            .push_bind(path(order.field))
            .push(") = ")
            .push_bind(json_type);

        if order.kind == SortKind::Timestamp {
            builder
                .push(" AND data #>> ")
                .push_bind(path(order.field))
                .push(" ~ ")
                .push_bind(TIMESTAMP_PATTERN);
        }

        builder
            .push(" THEN (data #>> ")
            .push_bind(path(order.field))
            .push(") END");
        builder.push(cast);

        builder.push(match order.direction {
            SortOrder::Asc => " ASC NULLS FIRST, ",
            SortOrder::Desc => " DESC NULLS LAST, ",
        });
    }

    builder.push("seq ASC");
}
