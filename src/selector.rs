use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use log::{debug, warn, Logger};
use once_cell::sync::OnceCell;
use sqlx::postgres::PgPoolOptions;

use crate::config::{get_optional_variable, get_parsed_variable};
use crate::docstore::{DocumentStore, PgDocumentStore};
use crate::errors::BackendError;
use crate::records::{Backend, MemoryStore};

pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 5;

/// Opens the managed document store.
pub trait Connector: Send + Sync {
    fn connect(&self) -> BoxFuture<Result<Arc<dyn DocumentStore>, BackendError>>;
}

/// Connects to the PostgreSQL-backed document store.
///
/// The pool is kept once a connection succeeds; until then every call
/// tries again, so a database that comes up after the backend does is
/// picked up on the next request.
pub struct PgConnector {
    connection_string: Option<String>,
    timeout: Duration,
    store: OnceCell<Arc<dyn DocumentStore>>,
}

impl PgConnector {
    pub fn new(connection_string: Option<String>, timeout: Duration) -> Self {
        PgConnector {
            connection_string,
            timeout,
            store: OnceCell::new(),
        }
    }

    /// Reads `BACKEND_DB_CONNECTION_STRING` and
    /// `BACKEND_DB_CONNECT_TIMEOUT_SECONDS`.
    pub fn from_env() -> Self {
        PgConnector::new(
            get_optional_variable("BACKEND_DB_CONNECTION_STRING"),
            Duration::from_secs(get_parsed_variable(
                "BACKEND_DB_CONNECT_TIMEOUT_SECONDS",
                DEFAULT_CONNECT_TIMEOUT_SECONDS,
            )),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.connection_string.is_some()
    }
}

impl Connector for PgConnector {
    fn connect(&self) -> BoxFuture<Result<Arc<dyn DocumentStore>, BackendError>> {
        async move {
            if let Some(store) = self.store.get() {
                return Ok(store.clone());
            }

            let connection_string = self.connection_string.as_deref().ok_or_else(|| BackendError::StoreUnavailable {
                reason: "BACKEND_DB_CONNECTION_STRING is not set".to_owned(),
            })?;

            let pool = PgPoolOptions::new()
                .acquire_timeout(self.timeout)
                .connect(connection_string)
                .await
                .map_err(|e| BackendError::StoreUnavailable { reason: e.to_string() })?;

            let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(pool));

            Ok(self.store.get_or_init(|| store).clone())
        }
        .boxed()
    }
}

/// Decides, for each call, whether records go to the managed store or
/// the in-process fallback.
pub struct Selector {
    logger: Arc<Logger>,
    connector: Arc<dyn Connector>,
    fallback: Arc<MemoryStore>,
}

impl Selector {
    pub fn new(logger: Arc<Logger>, connector: Arc<dyn Connector>, fallback: Arc<MemoryStore>) -> Self {
        Selector {
            logger,
            connector,
            fallback,
        }
    }

    /// Tries the managed store. Never fails: if the store can't be
    /// reached, the reason is logged and the in-process store is used.
    pub async fn resolve(&self) -> Backend {
        match self.connector.connect().await {
            Ok(store) => {
                debug!(self.logger, "Using managed document store");
                Backend::Managed(store)
            }
            Err(e) => {
                warn!(self.logger, "Managed document store unavailable, using in-process store"; "error" => %e);
                Backend::InProcess(self.fallback.clone())
            }
        }
    }
}
