//! Typed query helpers for the mapping tables.
//!
//! Table and column names are checked with [`ident::check`] before they are
//! interpolated; every value is a bound parameter.

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, warn};

use super::Database;
use crate::backend::ident;
use crate::errors::BackendError;

/// Result of [`Database::insert_mapping`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written with the requested canonical id.
    Inserted,
    /// The `(source, source_id)` pair already belongs to this canonical id.
    Existing(String),
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// `SELECT id` for the row whose `column` equals `source_id`, on an open connection.
fn find_canonical_on(
    conn: &Connection,
    table: &str,
    column: &str,
    source_id: &str,
) -> Result<Option<String>, BackendError> {
    let canonical = conn
        .query_row(
            &format!("SELECT id FROM \"{table}\" WHERE \"{column}\" = ?1"),
            params![source_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(canonical)
}

impl Database {
    /// Insert a row linking `source_id` in `column` to `canonical`.
    ///
    /// The UNIQUE index on `column` is the authoritative existence check: if
    /// it fires, the stored canonical is read back in the same transaction.
    /// If the canonical id itself is already taken by a row that does not
    /// hold this `source_id`, the insert is refused with
    /// [`BackendError::Conflict`].
    pub fn insert_mapping(
        &self,
        table: &str,
        column: &str,
        canonical: &str,
        source_id: &str,
    ) -> Result<InsertOutcome, BackendError> {
        let table = ident::check("object type", table)?;
        let column = ident::check("source", column)?;

        self.transaction(|conn| {
            let inserted = conn.execute(
                &format!("INSERT INTO \"{table}\" (id, \"{column}\") VALUES (?1, ?2)"),
                params![canonical, source_id],
            );
            match inserted {
                Ok(_) => {
                    debug!(table, column, canonical, source_id, "inserted mapping row");
                    Ok(InsertOutcome::Inserted)
                }
                Err(e) if is_constraint_violation(&e) => {
                    match find_canonical_on(conn, table, column, source_id)? {
                        Some(existing) => {
                            debug!(
                                table,
                                column,
                                source_id,
                                existing = %existing,
                                "mapping already exists"
                            );
                            Ok(InsertOutcome::Existing(existing))
                        }
                        None => {
                            warn!(table, canonical, "canonical id already in use");
                            Err(BackendError::Conflict {
                                object_type: table.to_string(),
                                source_name: column.to_string(),
                                source_id: source_id.to_string(),
                                canonical: canonical.to_string(),
                            })
                        }
                    }
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Canonical id of the row whose `column` equals `source_id`.
    pub fn find_canonical(
        &self,
        table: &str,
        column: &str,
        source_id: &str,
    ) -> Result<Option<String>, BackendError> {
        let table = ident::check("object type", table)?;
        let column = ident::check("source", column)?;
        let conn = self.conn();
        find_canonical_on(&conn, table, column, source_id)
    }

    /// Set `column` of the row `canonical` to `source_id`. Returns the number
    /// of rows changed, which is 0 when the row does not exist.
    ///
    /// A pair already held by a different canonical row is reported as
    /// [`BackendError::Conflict`] naming that row.
    pub fn set_source(
        &self,
        table: &str,
        column: &str,
        canonical: &str,
        source_id: &str,
    ) -> Result<usize, BackendError> {
        let table = ident::check("object type", table)?;
        let column = ident::check("source", column)?;

        self.transaction(|conn| {
            let updated = conn.execute(
                &format!("UPDATE \"{table}\" SET \"{column}\" = ?1 WHERE id = ?2"),
                params![source_id, canonical],
            );
            match updated {
                Ok(changed) => {
                    debug!(table, column, canonical, changed, "updated mapping row");
                    Ok(changed)
                }
                Err(e) if is_constraint_violation(&e) => {
                    let holder = find_canonical_on(conn, table, column, source_id)?
                        .unwrap_or_default();
                    Err(BackendError::Conflict {
                        object_type: table.to_string(),
                        source_name: column.to_string(),
                        source_id: source_id.to_string(),
                        canonical: holder,
                    })
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Read `columns` of the row `canonical`, in the order given.
    ///
    /// Returns `None` when no such row exists.
    pub fn source_ids(
        &self,
        table: &str,
        canonical: &str,
        columns: &[String],
    ) -> Result<Option<Vec<(String, Option<String>)>>, BackendError> {
        let table = ident::check("object type", table)?;
        if columns.is_empty() {
            return Ok(None);
        }
        let select = columns
            .iter()
            .map(|c| ident::check("source", c).map(|c| format!("\"{c}\"")))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");

        let conn = self.conn();
        let row = conn
            .query_row(
                &format!("SELECT {select} FROM \"{table}\" WHERE id = ?1"),
                params![canonical],
                |row| {
                    columns
                        .iter()
                        .enumerate()
                        .map(|(i, name)| Ok((name.clone(), row.get::<_, Option<String>>(i)?)))
                        .collect::<Result<Vec<_>, rusqlite::Error>>()
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Run raw statements in a single transaction.
    pub fn execute_statements(&self, statements: &[String]) -> Result<(), BackendError> {
        self.transaction(|conn| {
            for statement in statements {
                conn.execute_batch(statement)?;
            }
            Ok(())
        })
    }
}
