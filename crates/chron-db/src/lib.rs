//! # chron-db
//!
//! libSQL persistence for the Chronicle audit log.
//!
//! Handles the append-only `audits` table, lazy history cursors, bounded
//! reconstruction, undo against live record stores, the ambient actor
//! context, and the JSONL trail mirror.
//!
//! Uses the `libsql` crate (C `SQLite` fork, v0.9.29) in local mode.

pub mod codec;
pub mod context;
pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod service;
pub mod trail;
pub mod undo;

#[cfg(test)]
mod test_support;

use std::path::Path;

use codec::PayloadCodec;
use error::DatabaseError;
use libsql::Builder;

/// Central database handle for the audit log.
///
/// Wraps a libSQL database and connection. Provides ID generation and
/// schema introspection; repository methods live on `AuditService`.
pub struct ChronDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl ChronDb {
    /// Open a local database at the given path, or `":memory:"`.
    ///
    /// Creates missing parent directories and runs migrations on open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Other(e.into()))?;
                }
            }
        }

        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        let chron_db = Self { db, conn };
        chron_db.run_migrations().await?;
        tracing::debug!(path, "opened audit database");
        Ok(chron_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Generate a prefixed ID via libSQL. Returns e.g., `"aud-5e0c9a17d4b2f386"`.
    ///
    /// Uses `randomblob(8)` in SQL to produce 16-char hex, then prepends the prefix.
    /// The audit table only grows, so the body needs 64 bits to keep collisions
    /// out of reach.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT '{prefix}-' || lower(hex(randomblob(8)))"),
                (),
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        Ok(row.get::<String>(0)?)
    }

    /// Strategy the `audited_changes` column natively supports.
    ///
    /// A column declared `JSON`, `JSONB`, or `BLOB` takes structured bytes;
    /// anything else takes JSON text.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` if the `audits` table has no
    /// `audited_changes` column.
    pub async fn payload_column_capability(&self) -> Result<PayloadCodec, DatabaseError> {
        let mut rows = self.conn.query("PRAGMA table_info(audits)", ()).await?;
        while let Some(row) = rows.next().await? {
            let name = row.get::<String>(1)?;
            if name == "audited_changes" {
                let declared = row.get::<Option<String>>(2)?.unwrap_or_default();
                return Ok(PayloadCodec::from_declared_type(&declared));
            }
        }
        Err(DatabaseError::InvalidState(
            "audits table has no audited_changes column".into(),
        ))
    }
}
