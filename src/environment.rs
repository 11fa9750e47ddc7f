use std::sync::Arc;

use log::Logger;

use crate::article::ArticleService;
use crate::organizer::OrganizerService;
use crate::records::MemoryStore;
use crate::selector::{Connector, Selector};

/// The default actor for writes whose request doesn't name one.
pub const DEFAULT_ACTOR: &str = "admin-1";

#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub articles: ArticleService,
    pub organizers: OrganizerService,
}

impl Environment {
    pub fn new(logger: Arc<Logger>, selector: Arc<Selector>) -> Self {
        Self {
            articles: ArticleService::new(logger.clone(), selector.clone()),
            organizers: OrganizerService::new(logger.clone(), selector),
            logger,
        }
    }

    /// Builds the services around `connector`, with a fresh in-process
    /// store to fall back on.
    pub fn with_connector(logger: Arc<Logger>, connector: Arc<dyn Connector>) -> Self {
        let selector = Selector::new(logger.clone(), connector, Arc::new(MemoryStore::new()));

        Environment::new(logger, Arc::new(selector))
    }
}
