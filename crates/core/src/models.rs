//! Domain model types shared by the backends and the web API.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// One fact linking a source-local identifier to a canonical identifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mapping {
    /// Shared identifier; empty until assigned.
    #[serde(default)]
    pub canonical: String,
    /// Kind of entity, e.g. `person`. Selects the table or node label.
    pub object_type: String,
    /// Name of the originating system.
    pub source: String,
    /// Identifier assigned by `source`.
    pub source_id: String,
    /// Caller-facing URL derived from `canonical`. Never persisted.
    #[serde(default)]
    pub object: String,
}

/// All known sources for one canonical entity.
pub type Mappings = Vec<Mapping>;

impl Mapping {
    /// Build a mapping with its object URL filled in.
    pub fn new(
        canonical: impl Into<String>,
        source: impl Into<String>,
        source_id: impl Into<String>,
        object_type: impl Into<String>,
        base_url: &str,
    ) -> Self {
        let mut mapping = Self {
            canonical: canonical.into(),
            object_type: object_type.into(),
            source: source.into(),
            source_id: source_id.into(),
            object: String::new(),
        };
        mapping.object = mapping.object_url(base_url);
        mapping
    }

    /// A request for `(object_type, source, source_id)` with no canonical yet.
    pub fn for_source(
        object_type: impl Into<String>,
        source: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            source: source.into(),
            source_id: source_id.into(),
            ..Default::default()
        }
    }

    /// A request addressing an existing canonical entity.
    pub fn for_canonical(object_type: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            canonical: canonical.into(),
            ..Default::default()
        }
    }

    /// `{base_url}/{object_type}/{canonical}`.
    pub fn object_url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            self.object_type,
            self.canonical
        )
    }

    /// Assign a fresh canonical id if none was proposed, returning the id.
    pub fn ensure_canonical(&mut self) -> &str {
        if self.canonical.is_empty() {
            self.canonical = uuid::Uuid::new_v4().to_string();
        }
        &self.canonical
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Status vocabulary reported alongside every contract result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Created,
    NoContent,
    BadRequest,
    NotFound,
    Conflict,
    InternalError,
    ServiceUnavailable,
}

impl Status {
    /// Numeric HTTP-equivalent code.
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::NoContent => 204,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::InternalError => 500,
            Self::ServiceUnavailable => 503,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::Created | Self::NoContent)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Created => write!(f, "created"),
            Self::NoContent => write!(f, "no_content"),
            Self::BadRequest => write!(f, "bad_request"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::InternalError => write!(f, "internal_error"),
            Self::ServiceUnavailable => write!(f, "service_unavailable"),
        }
    }
}
