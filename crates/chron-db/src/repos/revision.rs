//! Store-driven reconstruction.
//!
//! Streams a target's history through the cursor and folds it with
//! [`Reconstruction`], stopping at the bound instead of loading every record.

use chrono::{DateTime, Utc};
use chron_core::revision::{ReconstructedState, Reconstruction};
use chron_core::target::TargetRef;

use crate::error::DatabaseError;
use crate::repos::cursor::AuditQuery;
use crate::service::AuditService;

/// Upper bound for a reconstruction. Unset fields are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevisionBound {
    pub to_version: Option<i64>,
    pub up_until: Option<DateTime<Utc>>,
}

impl RevisionBound {
    #[must_use]
    pub const fn version(version: i64) -> Self {
        Self {
            to_version: Some(version),
            up_until: None,
        }
    }

    #[must_use]
    pub const fn at(time: DateTime<Utc>) -> Self {
        Self {
            to_version: None,
            up_until: Some(time),
        }
    }

    fn query(self) -> AuditQuery {
        AuditQuery {
            to_version: self.to_version,
            up_until: self.up_until,
            ..AuditQuery::default()
        }
    }
}

impl AuditService {
    /// Attribute state of `target` as of `bound`.
    ///
    /// Unknown targets and bounds before the first record yield an empty
    /// state at version 0.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a page query fails.
    pub async fn reconstruct(
        &self,
        target: &TargetRef,
        bound: RevisionBound,
    ) -> Result<ReconstructedState, DatabaseError> {
        let mut cursor = self.query(target, bound.query());
        let mut fold = Reconstruction::new();
        while let Some(record) = cursor.next_record().await? {
            fold.apply(&record);
        }
        tracing::debug!(target_ref = %target, folded = fold.folded(), "reconstructed");
        Ok(fold.finish())
    }

    /// State as of `version`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a page query fails.
    pub async fn revision(
        &self,
        target: &TargetRef,
        version: i64,
    ) -> Result<ReconstructedState, DatabaseError> {
        self.reconstruct(target, RevisionBound::version(version)).await
    }

    /// State as of `time`, inclusive.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a page query fails.
    pub async fn revision_at(
        &self,
        target: &TargetRef,
        time: DateTime<Utc>,
    ) -> Result<ReconstructedState, DatabaseError> {
        self.reconstruct(target, RevisionBound::at(time)).await
    }

    /// State after each record in order, one pass over the history.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a page query fails.
    pub async fn revisions(
        &self,
        target: &TargetRef,
    ) -> Result<Vec<ReconstructedState>, DatabaseError> {
        let mut cursor = self.query(target, AuditQuery::new());
        let mut fold = Reconstruction::new();
        let mut states = Vec::new();
        while let Some(record) = cursor.next_record().await? {
            fold.apply(&record);
            states.push(fold.state().clone());
        }
        Ok(states)
    }
}
