//! Turns untyped query rows into ordered, string-valued records.
//!
//! This is the only place that inspects raw driver values. Every cell becomes
//! either text or an explicit [`Cell::Null`], and each record keeps the
//! column order of the query.

use serde_json::Value;

use super::StatementResult;
use crate::errors::BackendError;

/// A single normalized value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Null,
}

impl Cell {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::String(s) => Cell::Text(s.clone()),
            Value::Bool(b) => Cell::Text(b.to_string()),
            Value::Number(n) => Cell::Text(n.to_string()),
            // Nodes, maps and lists keep their compact JSON form.
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            Cell::Null => None,
        }
    }
}

/// One row as `(column, value)` pairs in query order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    cells: Vec<(String, Cell)>,
}

impl Record {
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Value at `index` in column order.
    pub fn at(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index).map(|(_, cell)| cell)
    }

    /// Value of the first column named `column`.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    /// Text of `column`; a missing column or null value is a decode error.
    pub fn text(&self, column: &str) -> Result<&str, BackendError> {
        match self.get(column) {
            Some(Cell::Text(s)) => Ok(s),
            Some(Cell::Null) => Err(BackendError::Decode(format!("column '{}' is null", column))),
            None => Err(BackendError::Decode(format!("column '{}' missing from result", column))),
        }
    }
}

/// Normalize every row of `result`, preserving row order.
pub fn normalize(result: &StatementResult) -> Result<Vec<Record>, BackendError> {
    result
        .data
        .iter()
        .enumerate()
        .map(|(index, data)| {
            let row = data
                .row
                .as_ref()
                .ok_or_else(|| BackendError::Decode(format!("row {} has no row data", index)))?;
            if row.len() != result.columns.len() {
                return Err(BackendError::Decode(format!(
                    "row {} has {} values for {} columns",
                    index,
                    row.len(),
                    result.columns.len()
                )));
            }
            let cells = result
                .columns
                .iter()
                .zip(row)
                .map(|(column, value)| (column.clone(), Cell::from_value(value)))
                .collect();
            Ok(Record { cells })
        })
        .collect()
}
