//! Error types for the gref core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type.

use thiserror::Error;

use crate::models::Status;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

// ---------------------------------------------------------------------------
// Backend errors
// ---------------------------------------------------------------------------

/// Errors raised by a storage backend while serving a contract call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The store is unreachable or rejected the credentials.
    #[error("backend connection error: {0}")]
    Connection(String),

    /// An operation was attempted before `boot` established a connection.
    #[error("{0} backend has not been booted")]
    NotBooted(&'static str),

    /// A resolve operation found no matching record.
    #[error("no {object_type} mapping found for {key}")]
    NotFound { object_type: String, key: String },

    /// The `(source, source_id)` pair is already linked to another canonical.
    #[error(
        "{object_type} mapping for {source_name}:{source_id} already exists under canonical '{canonical}'"
    )]
    Conflict {
        object_type: String,
        source_name: String,
        source_id: String,
        canonical: String,
    },

    /// A backend-native statement was malformed or failed to run.
    #[error("query execution failed: {0}")]
    QueryExecution(String),

    /// A result row or column could not be interpreted.
    #[error("failed to decode query result: {0}")]
    Decode(String),

    /// A name destined for statement interpolation is not a plain identifier.
    #[error("invalid {field} '{value}': must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidIdentifier { field: &'static str, value: String },

    /// The object type is not one of the configured types.
    #[error("unknown object type '{0}'")]
    UnknownObjectType(String),

    /// The source is not one of the configured source systems.
    #[error("unknown source '{0}'")]
    UnknownSource(String),

    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// HTTP transport error talking to the graph store.
    #[error("graph transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl BackendError {
    /// The status code this error reports to callers.
    pub fn status(&self) -> Status {
        match self {
            Self::Connection(_) | Self::NotBooted(_) | Self::Http(_) => Status::ServiceUnavailable,
            Self::NotFound { .. } => Status::NotFound,
            Self::Conflict { .. } => Status::Conflict,
            Self::InvalidIdentifier { .. }
            | Self::UnknownObjectType(_)
            | Self::UnknownSource(_) => Status::BadRequest,
            Self::QueryExecution(_) | Self::Decode(_) | Self::Sqlite(_) => Status::InternalError,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
