pub mod article;
pub mod config;
pub mod docstore;
pub mod environment;
pub mod errors;
pub mod organizer;
pub mod query;
pub mod records;
pub mod routes;
pub mod selector;
pub mod slug;
