//! The storage-backend contract and backend selection.
//!
//! Callers hold a single `Box<dyn Backend>` chosen at startup by
//! [`from_config`] and never see the concrete engine. Both engines report the
//! same statuses for the same situations:
//!
//! | operation        | success                      | expected failures          |
//! |------------------|------------------------------|----------------------------|
//! | `map_create`     | `Created`, or `Conflict` with the stored canonical written back | |
//! | `map_update`     | `Ok` (relational), `NoContent` (graph) | `Conflict`; `NotFound` (relational) |
//! | `source_info`    | `Ok`                         | `NotFound`                 |
//! | `canonical_info` | `Ok`                         | `NotFound`                 |
//!
//! Object types and sources outside the configured [`Vocabulary`] are
//! `BadRequest` on every operation, before the store is touched.

pub mod graph;
pub mod ident;
pub mod relational;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::{AppConfig, BackendKind};
use crate::errors::BackendError;
use crate::models::{Mapping, Mappings, Status};

pub use graph::GraphBackend;
pub use relational::RelationalBackend;

/// Capability set every storage engine provides.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Establish the connection used by every later call. Called once at
    /// startup; failure is fatal for the process.
    async fn boot(&mut self) -> Result<(), BackendError>;

    /// Liveness check returning [`name`](Self::name). Never reads stored data.
    async fn ping(&self) -> Result<String, BackendError>;

    /// Stable identifier of the engine, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Run raw backend-native statements. Results are discarded.
    async fn execute(&self, queries: &[String]) -> Result<(), BackendError>;

    /// Register `(object_type, source, source_id)`.
    ///
    /// An empty `mapping.canonical` is filled with a fresh id. When the triple
    /// is already registered the call returns [`Status::Conflict`] and
    /// `mapping.canonical` is overwritten with the stored id.
    async fn map_create(&self, mapping: &mut Mapping) -> Result<Status, BackendError>;

    /// Attach `(source, source_id)` to the existing `mapping.canonical`.
    async fn map_update(&self, mapping: &Mapping) -> Result<(String, Status), BackendError>;

    /// Resolve `(object_type, source, source_id)` to its canonical id. The id
    /// is also written to `mapping.canonical`.
    async fn source_info(&self, mapping: &mut Mapping) -> Result<(String, Status), BackendError>;

    /// Every `(source, source_id)` linked to `mapping.canonical`, each with its
    /// object URL built from `base_url`.
    async fn canonical_info(
        &self,
        mapping: &Mapping,
        base_url: &str,
    ) -> Result<(Mappings, Status), BackendError>;
}

/// Source systems and object types a backend accepts.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    pub sources: Vec<String>,
    pub object_types: Vec<String>,
}

impl Vocabulary {
    pub fn new(sources: Vec<String>, object_types: Vec<String>) -> Self {
        Self {
            sources,
            object_types,
        }
    }

    pub fn check_object_type(&self, object_type: &str) -> Result<(), BackendError> {
        if self.object_types.iter().any(|t| t == object_type) {
            Ok(())
        } else {
            Err(BackendError::UnknownObjectType(object_type.to_string()))
        }
    }

    pub fn check_source(&self, source: &str) -> Result<(), BackendError> {
        if self.sources.iter().any(|s| s == source) {
            Ok(())
        } else {
            Err(BackendError::UnknownSource(source.to_string()))
        }
    }

    /// Both checks, for operations addressed by `(object_type, source)`.
    pub fn check_pair(&self, object_type: &str, source: &str) -> Result<(), BackendError> {
        self.check_object_type(object_type)?;
        self.check_source(source)
    }
}

/// Log a storage error where it is detected and hand it back.
pub(crate) fn logged(backend: &'static str, err: BackendError) -> BackendError {
    match err.status() {
        Status::InternalError | Status::ServiceUnavailable => {
            error!(backend, error = %err, "backend error")
        }
        _ => warn!(backend, error = %err, "backend request rejected"),
    }
    err
}

/// Build the backend selected by `config.registry.backend`. The result still
/// needs [`Backend::boot`].
pub fn from_config(config: &AppConfig) -> Box<dyn Backend> {
    info!(backend = %config.registry.backend, "selecting storage backend");
    let names = Vocabulary::new(
        config.registry.sources.clone(),
        config.registry.object_types.clone(),
    );
    match config.registry.backend {
        BackendKind::Relational => {
            Box::new(RelationalBackend::new(config.relational.clone(), names))
        }
        BackendKind::Graph => Box::new(GraphBackend::new(config.graph.clone(), names)),
    }
}
