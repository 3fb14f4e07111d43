//! gref core library.
//!
//! This crate provides the canonical identity registry: the mapping model,
//! the storage-backend contract, and its two implementations (a relational
//! backend over SQLite and a graph backend over Neo4j's HTTP Cypher
//! endpoint), plus configuration and error types.

pub mod backend;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod neo;

// Re-exports for convenience.
pub use backend::{Backend, GraphBackend, RelationalBackend, Vocabulary};
pub use config::AppConfig;
pub use errors::{BackendError, CoreError};
pub use models::{Mapping, Mappings, Status};
