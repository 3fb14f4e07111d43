//! TOML-based configuration for the registry.
//!
//! Every section has defaults, so an empty file is a valid configuration.
//! Connection settings can be overridden from the environment via
//! [`AppConfig::resolve_env_vars`]; the graph password is only ever read from
//! the environment variable named by `graph.password_env`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::ident;
use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener and logging settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Backend selection and the known sources / object types.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Relational (SQLite) backend settings.
    #[serde(default)]
    pub relational: RelationalConfig,

    /// Graph (Neo4j) backend settings.
    #[serde(default)]
    pub graph: GraphConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default `127.0.0.1:8080`).
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Base URL used to build each mapping's object URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen() -> String {
    "127.0.0.1:8080".into()
}
fn default_base_url() -> String {
    "http://localhost:8080".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            base_url: default_base_url(),
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Which storage engine serves the contract.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Table per object type, column per source.
    #[default]
    Relational,
    /// Node label per object type, typed edge per source.
    Graph,
}

impl BackendKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "relational" | "sql" | "sqlite" => Some(Self::Relational),
            "graph" | "neo" | "neo4j" => Some(Self::Graph),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relational => write!(f, "relational"),
            Self::Graph => write!(f, "graph"),
        }
    }
}

/// Registry-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Active backend.
    #[serde(default)]
    pub backend: BackendKind,

    /// Recognised source-system names.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,

    /// Recognised object types.
    #[serde(default = "default_object_types")]
    pub object_types: Vec<String>,
}

fn default_sources() -> Vec<String> {
    ["salesforce", "ezpublish", "zuora", "gluu"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_object_types() -> Vec<String> {
    vec!["person".into(), "article".into()]
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            sources: default_sources(),
            object_types: default_object_types(),
        }
    }
}

// ---------------------------------------------------------------------------
// Relational
// ---------------------------------------------------------------------------

/// Relational backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalConfig {
    /// SQLite database file. `:memory:` opens a private in-memory database.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("gref.db")
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Graph backend settings. Defaults match an out-of-the-box Neo4j install.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,

    #[serde(default = "default_neo_host")]
    pub host: String,

    #[serde(default = "default_neo_port")]
    pub port: u16,

    #[serde(default = "default_neo_user")]
    pub username: String,

    /// Environment variable holding the password.
    #[serde(default = "default_neo_password_env")]
    pub password_env: String,

    /// Database name in the transactional endpoint path.
    #[serde(default = "default_neo_database")]
    pub database: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Resolved password (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub password: Option<String>,
}

fn default_scheme() -> String {
    "http".into()
}
fn default_neo_host() -> String {
    "localhost".into()
}
fn default_neo_port() -> u16 {
    7474
}
fn default_neo_user() -> String {
    "neo4j".into()
}
fn default_neo_password_env() -> String {
    "GREF_NEO_PASS".into()
}
fn default_neo_database() -> String {
    "neo4j".into()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_neo_host(),
            port: default_neo_port(),
            username: default_neo_user(),
            password_env: default_neo_password_env(),
            database: default_neo_database(),
            timeout_secs: default_timeout_secs(),
            password: None,
        }
    }
}

impl GraphConfig {
    /// `{scheme}://{host}:{port}`.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// URL of the auto-commit transactional Cypher endpoint.
    pub fn commit_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.base_url(), self.database)
    }

    /// The resolved password, or the store's out-of-the-box default.
    pub fn password_or_default(&self) -> &str {
        self.password.as_deref().unwrap_or("neo4j")
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** apply environment overrides -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Apply environment overrides on top of the file / default values.
    ///
    /// Unset variables leave the current value untouched. Values that are
    /// set but unparsable are rejected.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment overrides");

        if let Some(raw) = resolve_optional_env("GREF_BACKEND", "registry.backend") {
            self.registry.backend =
                BackendKind::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                    field: "registry.backend".into(),
                    detail: format!("unknown backend '{}'", raw),
                })?;
        }
        if let Some(path) = resolve_optional_env("GREF_DB_PATH", "relational.path") {
            self.relational.path = PathBuf::from(path);
        }
        if let Some(host) = resolve_optional_env("GREF_NEO_HOST", "graph.host") {
            self.graph.host = host;
        }
        if let Some(raw) = resolve_optional_env("GREF_NEO_PORT", "graph.port") {
            self.graph.port = raw.parse().map_err(|_| ConfigError::InvalidValue {
                field: "graph.port".into(),
                detail: format!("'{}' is not a port number", raw),
            })?;
        }
        if let Some(user) = resolve_optional_env("GREF_NEO_USER", "graph.username") {
            self.graph.username = user;
        }
        self.graph.password = resolve_optional_env(&self.graph.password_env, "graph.password_env");
        if self.graph.password.is_none() {
            debug!("graph password not set, using the store default");
        }

        debug!("environment override resolution complete");
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server.listen".into(),
                detail: "listen address must not be empty".into(),
            });
        }
        validate_names("registry.sources", &self.registry.sources)?;
        validate_names("registry.object_types", &self.registry.object_types)?;
        if self.graph.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "graph.port".into(),
                detail: "port must be > 0".into(),
            });
        }
        if self.relational.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "relational.path".into(),
                detail: "database path must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

/// Non-empty, unique, and safe to interpolate as table/column/label names.
fn validate_names(field: &str, names: &[String]) -> Result<(), ConfigError> {
    if names.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.into(),
            detail: "list must not be empty".into(),
        });
    }
    let mut seen = HashSet::new();
    for name in names {
        if !ident::is_identifier(name) {
            return Err(ConfigError::InvalidValue {
                field: field.into(),
                detail: format!("'{}' is not a plain identifier", name),
            });
        }
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: field.into(),
                detail: format!("'{}' is listed more than once", name),
            });
        }
    }
    Ok(())
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; returns `None` if the variable is unset or empty.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => None,
    }
}
