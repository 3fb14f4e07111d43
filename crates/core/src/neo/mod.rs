//! Cypher plumbing for the graph backend.
//!
//! A [`CypherTransport`] runs a batch of [`Statement`]s and returns the raw,
//! column-described result sets. [`HttpTransport`] talks to the Neo4j
//! transactional HTTP endpoint; [`normalize`] turns raw rows into ordered
//! string records.

pub mod http;
pub mod normalize;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::BackendError;

pub use http::HttpTransport;
pub use normalize::{normalize, Cell, Record};

/// One Cypher statement with its bound parameters.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Statement {
    pub statement: String,
    pub parameters: Map<String, Value>,
}

impl Statement {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: Map::new(),
        }
    }

    /// Bind `$name` to `value`.
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }
}

/// Raw result of one statement: column names plus untyped rows.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StatementResult {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<RowData>,
}

/// One raw row. `row` is absent when the server was asked for graph output.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RowData {
    #[serde(default)]
    pub row: Option<Vec<Value>>,
}

impl StatementResult {
    /// Build a result from literal rows.
    pub fn from_rows(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            data: rows.into_iter().map(|row| RowData { row: Some(row) }).collect(),
        }
    }
}

/// Runs Cypher statements against a graph store.
#[async_trait]
pub trait CypherTransport: Send + Sync {
    /// Run `statements` in one transaction, returning one result per statement.
    async fn run(&self, statements: &[Statement]) -> Result<Vec<StatementResult>, BackendError>;
}
