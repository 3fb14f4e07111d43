//! Neo4j transactional HTTP endpoint client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use super::{CypherTransport, Statement, StatementResult};
use crate::config::GraphConfig;
use crate::errors::BackendError;

#[derive(Serialize)]
struct TxRequest<'a> {
    statements: &'a [Statement],
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

/// [`CypherTransport`] over `POST /db/{database}/tx/commit`.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    commit_url: String,
    username: String,
    password: String,
}

impl HttpTransport {
    pub fn new(config: &GraphConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("gref/0.1"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let commit_url = config.commit_url();
        info!(commit_url = %commit_url, user = %config.username, "created graph HTTP transport");
        Ok(Self {
            http,
            commit_url,
            username: config.username.clone(),
            password: config.password_or_default().to_string(),
        })
    }
}

#[async_trait]
impl CypherTransport for HttpTransport {
    #[instrument(skip(self, statements), fields(count = statements.len()))]
    async fn run(&self, statements: &[Statement]) -> Result<Vec<StatementResult>, BackendError> {
        let resp = self
            .http
            .post(&self.commit_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&TxRequest { statements })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "graph store unreachable");
                BackendError::from(e)
            })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(%status, "graph store rejected credentials");
            return Err(BackendError::Connection(format!(
                "graph store rejected credentials for '{}' (HTTP {})",
                self.username,
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(%status, body = %body, "graph store returned an error status");
            return Err(BackendError::QueryExecution(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let tx: TxResponse = resp.json().await.map_err(|e| {
            error!(error = %e, "unreadable graph store response");
            BackendError::Decode(e.to_string())
        })?;
        if !tx.errors.is_empty() {
            let detail = tx
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            error!(detail = %detail, "cypher statement failed");
            return Err(BackendError::QueryExecution(detail));
        }
        debug!(results = tx.results.len(), "cypher statements committed");
        Ok(tx.results)
    }
}
