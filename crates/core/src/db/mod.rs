//! SQLite persistence layer for the relational backend.
//!
//! Provides a [`Database`] handle with WAL-mode journaling, idempotent table
//! creation for the configured object types, and query helpers for the
//! mapping tables.

pub mod queries;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::errors::BackendError;

/// The relational backend's mapping store.
///
/// One connection behind a `Mutex`; registry calls take turns on it.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path`. The special path
    /// `:memory:` opens a private in-memory database.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        let path = path.as_ref();
        if path.as_os_str() == ":memory:" {
            return Self::in_memory();
        }
        info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;

        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        debug!(path = %path.display(), "mapping store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A private in-memory store, gone when dropped.
    pub fn in_memory() -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create the mapping tables for `object_types` with one column per
    /// source, adding columns for sources that are new since the last run.
    pub fn initialize(
        &self,
        object_types: &[String],
        sources: &[String],
    ) -> Result<(), BackendError> {
        info!(
            object_types = object_types.len(),
            sources = sources.len(),
            "ensuring mapping tables"
        );
        self.transaction(|conn| schema::ensure_tables(conn, object_types, sources))?;
        debug!("mapping tables are in place");
        Ok(())
    }

    /// Round trip to the engine without touching any table.
    pub fn ping(&self) -> Result<(), BackendError> {
        let one: i64 = self.conn().query_row("SELECT 1", [], |row| row.get(0))?;
        debug!(one, "database ping");
        Ok(())
    }

    /// Exclusive access to the mapping store for one registry call.
    ///
    /// A handler that panicked mid-call leaves no half-written mapping
    /// (writes go through [`Database::transaction`]), so a poisoned lock is
    /// taken over.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("mapping store lock poisoned by an earlier panic, continuing");
                poisoned.into_inner()
            }
        }
    }

    /// Run `f` as one atomic registry write: committed when it returns `Ok`,
    /// rolled back when it returns an error (the row insert and the read of
    /// an existing canonical happen in the same transaction).
    pub fn transaction<F, T>(&self, f: F) -> Result<T, BackendError>
    where
        F: FnOnce(&Connection) -> Result<T, BackendError>,
    {
        let mut guard = self.conn();
        let tx = guard.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
