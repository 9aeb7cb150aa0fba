//! SQLite metadata store.
//!
//! This module provides:
//! - The fixed relational schema (models, lookup tables, join tables,
//!   discussion subtree)
//! - The relational loader: lookup upserts and per-model loads
//! - The query layer that denormalizes one model back out of the join tables
//!
//! All access goes through one connection behind a mutex, so lookup upserts
//! are serialized through a single writer.

mod loader;
mod query;
mod schema;
mod tables;

pub use loader::LoadReport;
pub use query::{ModelInfoRow, ModelView};
pub use tables::LookupTable;

use crate::{PtmError, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Relational store for harvested model metadata.
pub struct MetadataStore {
    db_path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl MetadataStore {
    /// Create or open a store at the given path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PtmError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::from_connection(conn, Some(db_path))
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        Self::configure_connection(&conn)?;
        schema::ensure_schema(&conn)?;
        debug!("Opened metadata store at {:?}", db_path);

        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Configure connection settings shared by file and memory stores.
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA foreign_keys=ON;
            PRAGMA busy_timeout=30000;
            PRAGMA temp_store=MEMORY;
            ",
        )?;
        Ok(())
    }

    /// Database path, `None` for in-memory stores.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| PtmError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }

    /// Drop and recreate every table.
    pub fn reset(&self) -> Result<()> {
        let conn = self.lock()?;
        schema::drop_schema(&conn)?;
        schema::ensure_schema(&conn)?;
        debug!("Reset metadata store schema");
        Ok(())
    }

    /// Checkpoint the WAL file.
    pub fn checkpoint_wal(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}
