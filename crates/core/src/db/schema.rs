//! Mapping table layout.
//!
//! One table per object type. `id` holds the canonical identifier and each
//! known source gets a nullable column holding that source's local id. A
//! UNIQUE index per source column guarantees that a `(source, source_id)`
//! pair belongs to at most one canonical row; the relational backend relies
//! on that index instead of a separate existence check.
//!
//! Tables and columns are created when absent. There is no schema versioning.

use std::collections::HashSet;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::backend::ident;
use crate::errors::BackendError;

/// Create missing tables, source columns, and uniqueness indexes.
pub fn ensure_tables(
    conn: &Connection,
    object_types: &[String],
    sources: &[String],
) -> Result<(), BackendError> {
    for object_type in object_types {
        let table = ident::check("object type", object_type)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (id TEXT PRIMARY KEY NOT NULL);"
        ))?;

        let existing = table_columns(conn, table)?;
        for source in sources {
            let column = ident::check("source", source)?;
            if !existing.contains(column) {
                info!(table, column, "adding source column");
                conn.execute_batch(&format!(
                    "ALTER TABLE \"{table}\" ADD COLUMN \"{column}\" TEXT;"
                ))?;
            }
            conn.execute_batch(&format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS \"ux_{table}_{column}\" ON \"{table}\" (\"{column}\");"
            ))?;
        }
        debug!(table, "mapping table ready");
    }
    Ok(())
}

/// Column names of `table`.
pub fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>, BackendError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(columns)
}
