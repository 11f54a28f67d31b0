//! Service layer orchestrating audit appends, reads, and the trail mirror.
//!
//! `AuditService` wraps `ChronDb` (raw database access), `TrailWriter` (JSONL
//! mirror), and the payload codec. All repo methods are implemented as
//! `impl AuditService`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use chron_config::ChronConfig;

use crate::ChronDb;
use crate::codec::PayloadCodec;
use crate::error::DatabaseError;
use crate::trail::writer::TrailWriter;

const DEFAULT_PAGE_SIZE: u32 = 100;

/// The audit store.
///
/// Every append follows this protocol:
/// 1. Skip with `Suppressed` if tracking is off for the service or the task
/// 2. Fill id, timestamp, and attribution
/// 3. Insert the row, computing the version in the same statement
/// 4. Mirror the stored record to the JSONL trail
pub struct AuditService {
    db: ChronDb,
    trail: TrailWriter,
    codec: PayloadCodec,
    enabled: AtomicBool,
    page_size: u32,
    audit_undo: bool,
}

impl AuditService {
    /// Create a new service wrapping a local database.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the libSQL database file, or `":memory:"` for tests.
    /// * `trail_dir` - Directory for JSONL trail files. Pass `None` to disable
    ///   trail writing.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or the trail
    /// directory cannot be created.
    pub async fn new_local(
        db_path: &str,
        trail_dir: Option<PathBuf>,
    ) -> Result<Self, DatabaseError> {
        let db = ChronDb::open_local(db_path).await?;
        let trail = match trail_dir {
            Some(dir) => TrailWriter::new(dir)?,
            None => TrailWriter::disabled(),
        };
        let codec = db.payload_column_capability().await?;
        Ok(Self::from_db(db, trail).with_codec(codec))
    }

    /// Create a service from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or the trail
    /// directory cannot be created.
    pub async fn from_config(config: &ChronConfig) -> Result<Self, DatabaseError> {
        let db = ChronDb::open_local(&config.store.path).await?;
        let trail = match config.store.trail_path() {
            Some(dir) => TrailWriter::new(dir)?,
            None => TrailWriter::disabled(),
        };
        let capability = db.payload_column_capability().await?;
        let codec = PayloadCodec::resolve(config.store.payload_encoding, capability);

        let service = Self::from_db(db, trail)
            .with_codec(codec)
            .with_page_size(config.tracking.page_size)
            .with_audit_undo(config.tracking.audit_undo);
        service.set_enabled(config.tracking.enabled);

        tracing::debug!(
            path = %config.store.path,
            codec = ?codec,
            trail = service.trail.is_enabled(),
            "audit service ready"
        );
        Ok(service)
    }

    /// Create from an existing `ChronDb` (for testing).
    #[must_use]
    pub const fn from_db(db: ChronDb, trail: TrailWriter) -> Self {
        Self {
            db,
            trail,
            codec: PayloadCodec::Text,
            enabled: AtomicBool::new(true),
            page_size: DEFAULT_PAGE_SIZE,
            audit_undo: false,
        }
    }

    #[must_use]
    pub const fn with_codec(mut self, codec: PayloadCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Rows fetched per cursor page. Zero is treated as one.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Record an audit entry for the inverse change applied by undo.
    #[must_use]
    pub const fn with_audit_undo(mut self, audit_undo: bool) -> Self {
        self.audit_undo = audit_undo;
        self
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &ChronDb {
        &self.db
    }

    /// Access the trail writer mutably (e.g., to disable during rebuild).
    pub const fn trail_mut(&mut self) -> &mut TrailWriter {
        &mut self.trail
    }

    /// Access the trail writer.
    #[must_use]
    pub const fn trail(&self) -> &TrailWriter {
        &self.trail
    }

    #[must_use]
    pub const fn codec(&self) -> PayloadCodec {
        self.codec
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub const fn audit_undo_enabled(&self) -> bool {
        self.audit_undo
    }

    /// Turn change tracking on or off for every caller of this service.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        tracing::debug!(enabled, "audit tracking toggled");
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::test_service;

    #[tokio::test]
    async fn new_local_defaults() {
        let svc = AuditService::new_local(":memory:", None).await.unwrap();
        assert!(svc.is_enabled());
        assert!(!svc.trail().is_enabled());
        assert_eq!(svc.codec(), PayloadCodec::Text);
        assert_eq!(svc.page_size(), DEFAULT_PAGE_SIZE);
        assert!(!svc.audit_undo_enabled());
    }

    #[tokio::test]
    async fn set_enabled_toggles() {
        let svc = test_service().await;
        svc.set_enabled(false);
        assert!(!svc.is_enabled());
        svc.set_enabled(true);
        assert!(svc.is_enabled());
    }

    #[tokio::test]
    async fn zero_page_size_is_clamped() {
        let svc = test_service().await.with_page_size(0);
        assert_eq!(svc.page_size(), 1);
    }

    #[tokio::test]
    async fn from_config_applies_settings() {
        let mut config = ChronConfig::default();
        config.store.path = ":memory:".into();
        config.store.payload_encoding = chron_core::enums::PayloadEncoding::Structured;
        config.tracking.enabled = false;
        config.tracking.page_size = 7;
        config.tracking.audit_undo = true;

        let svc = AuditService::from_config(&config).await.unwrap();
        assert_eq!(svc.codec(), PayloadCodec::Structured);
        assert!(!svc.is_enabled());
        assert_eq!(svc.page_size(), 7);
        assert!(svc.audit_undo_enabled());
    }
}
