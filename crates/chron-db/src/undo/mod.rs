//! Undo of recorded changes against live records.
//!
//! Undo is split in two: [`plan`] derives the inverse operation from an audit
//! record without touching anything, and [`apply`] checks every precondition
//! and computes the new live state before issuing exactly one live-store
//! mutation. A failed undo leaves the live store as it was.
//!
//! ```text
//! create → delete the live record
//! update → set each changed attribute back to its old value
//! delete → recreate the record from its last known values
//! ```

pub mod live;
pub mod memory;

use std::collections::BTreeMap;

use chron_core::entities::{AuditRecord, NewAuditRecord};
use chron_core::enums::AuditAction;
use chron_core::errors::CoreError;
use chron_core::payload::{Change, ChangePayload};
use chron_core::revision::Revisable;
use chron_core::target::{TargetRef, TargetType};
use serde_json::Value;
use thiserror::Error;

use crate::error::DatabaseError;
use crate::service::AuditService;

pub use live::{LiveRecord, LiveRegistry, LiveStore, LiveStoreError};
pub use memory::MemoryLiveStore;

/// Errors from undo.
#[derive(Debug, Error)]
pub enum UndoError {
    /// The live record to delete or revert does not exist.
    #[error("Undo target {0} no longer exists")]
    TargetMissing(TargetRef),

    /// Restoring a deleted record would collide with a live one.
    #[error("Cannot restore {0}: a record with that identity already exists")]
    Duplicate(TargetRef),

    /// The stored record carries an action undo does not know.
    #[error("Cannot undo audit record with action '{0}'")]
    InvalidAction(String),

    #[error("No live store registered for target type '{0}'")]
    UnregisteredType(TargetType),

    #[error("Audit record {0} not found")]
    RecordNotFound(String),

    #[error(transparent)]
    Live(LiveStoreError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<LiveStoreError> for UndoError {
    fn from(err: LiveStoreError) -> Self {
        match err {
            LiveStoreError::NotFound(target) => Self::TargetMissing(target),
            LiveStoreError::Conflict(target) => Self::Duplicate(target),
            other @ LiveStoreError::Other(_) => Self::Live(other),
        }
    }
}

/// The inverse of one audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoPlan {
    /// Undo of a create.
    Delete { target: TargetRef },
    /// Undo of a delete: recreate with these values.
    Create {
        target: TargetRef,
        attributes: BTreeMap<String, Value>,
    },
    /// Undo of an update: set these attributes back.
    Revert {
        target: TargetRef,
        attributes: BTreeMap<String, Value>,
    },
}

impl UndoPlan {
    #[must_use]
    pub const fn target(&self) -> &TargetRef {
        match self {
            Self::Delete { target } | Self::Create { target, .. } | Self::Revert { target, .. } => {
                target
            }
        }
    }

    /// The live mutation this plan performs.
    #[must_use]
    pub const fn action(&self) -> AuditAction {
        match self {
            Self::Delete { .. } => AuditAction::Delete,
            Self::Create { .. } => AuditAction::Create,
            Self::Revert { .. } => AuditAction::Update,
        }
    }
}

/// What an applied undo did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoOutcome {
    pub target: TargetRef,
    /// The live mutation performed.
    pub action: AuditAction,
    /// The change applied to the live record, as a payload.
    pub inverse: ChangePayload,
    /// Attributes the live record refused.
    pub skipped: Vec<String>,
    /// The audit record describing the undo, when undo auditing is on.
    pub audit: Option<AuditRecord>,
    /// Why the undo audit record could not be appended. The live mutation
    /// stands regardless.
    pub audit_error: Option<String>,
}

/// Derive the inverse of `record`.
#[must_use]
pub fn plan(record: &AuditRecord) -> UndoPlan {
    let target = record.target.clone();
    match record.action {
        AuditAction::Create => UndoPlan::Delete { target },
        AuditAction::Delete => UndoPlan::Create {
            target,
            attributes: record.old_attributes(),
        },
        AuditAction::Update => UndoPlan::Revert {
            target,
            attributes: record.old_attributes(),
        },
    }
}

/// Carry out `plan` against the live store registered for its target type.
///
/// # Errors
///
/// - `UndoError::UnregisteredType` if no store handles the target type
/// - `UndoError::TargetMissing` if a delete or revert finds no live record
/// - `UndoError::Duplicate` if a restore collides with a live record
/// - `UndoError::Live` if the store itself fails
pub fn apply(plan: &UndoPlan, registry: &LiveRegistry) -> Result<UndoOutcome, UndoError> {
    let target = plan.target();
    let store = registry
        .resolve(&target.kind)
        .ok_or_else(|| UndoError::UnregisteredType(target.kind.clone()))?;

    let mut inverse = ChangePayload::new();
    let mut skipped = Vec::new();

    match plan {
        UndoPlan::Delete { target } => {
            let live = store
                .find(&target.id)?
                .ok_or_else(|| UndoError::TargetMissing(target.clone()))?;
            for (name, value) in &live.attributes {
                inverse.insert(name.clone(), Change::deleted(value.clone()));
            }
            store.delete(&live)?;
        }
        UndoPlan::Create { target, attributes } => {
            if store.unique_identity() && store.find(&target.id)?.is_some() {
                return Err(UndoError::Duplicate(target.clone()));
            }
            let mut record = store.build(&target.id);
            for (name, value) in attributes {
                if record.try_set(name, value) {
                    inverse.insert(name.clone(), Change::created(value.clone()));
                } else {
                    skipped.push(name.clone());
                }
            }
            store.create(record)?;
        }
        UndoPlan::Revert { target, attributes } => {
            let live = store
                .find(&target.id)?
                .ok_or_else(|| UndoError::TargetMissing(target.clone()))?;
            let mut reverted = live.clone();
            for (name, value) in attributes {
                if reverted.try_set(name, value) {
                    let before = live.get(name).cloned().unwrap_or(Value::Null);
                    inverse.insert(name.clone(), Change::new(before, value.clone()));
                } else {
                    skipped.push(name.clone());
                }
            }
            store.update(&reverted)?;
        }
    }

    if !skipped.is_empty() {
        tracing::debug!(target_ref = %target, ?skipped, "undo skipped unsupported attributes");
    }

    Ok(UndoOutcome {
        target: target.clone(),
        action: plan.action(),
        inverse,
        skipped,
        audit: None,
        audit_error: None,
    })
}

impl AuditService {
    /// Undo the audit record `audit_id` against the live stores in `registry`.
    ///
    /// # Errors
    ///
    /// Returns `UndoError::RecordNotFound` for an unknown id,
    /// `UndoError::InvalidAction` if the stored action is not recognised, and
    /// otherwise whatever [`apply`] returns.
    pub async fn undo(
        &self,
        audit_id: &str,
        registry: &LiveRegistry,
    ) -> Result<UndoOutcome, UndoError> {
        let record = match self.get(audit_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(UndoError::RecordNotFound(audit_id.to_string())),
            Err(DatabaseError::Core(CoreError::InvalidAction(action))) => {
                return Err(UndoError::InvalidAction(action));
            }
            Err(e) => return Err(e.into()),
        };
        self.undo_record(&record, registry).await
    }

    /// Undo an already loaded audit record.
    ///
    /// With undo auditing enabled, the inverse change is appended as a new
    /// record commented `undo of <id>`. The live mutation has already run by
    /// then, so a failed append is reported in [`UndoOutcome::audit_error`]
    /// rather than as an error.
    ///
    /// # Errors
    ///
    /// Returns whatever [`apply`] returns.
    pub async fn undo_record(
        &self,
        record: &AuditRecord,
        registry: &LiveRegistry,
    ) -> Result<UndoOutcome, UndoError> {
        let mut outcome = apply(&plan(record), registry)?;
        tracing::debug!(
            id = %record.id,
            target_ref = %outcome.target,
            action = %outcome.action,
            "undo applied"
        );

        if self.audit_undo_enabled() && !outcome.inverse.is_empty() {
            let appended = self
                .append(
                    NewAuditRecord::new(
                        outcome.target.clone(),
                        outcome.action,
                        outcome.inverse.clone(),
                    )
                    .comment(format!("undo of {}", record.id)),
                )
                .await;
            match appended {
                Ok(appended) => outcome.audit = appended.into_record(),
                Err(error) => {
                    tracing::warn!(
                        id = %record.id,
                        target_ref = %outcome.target,
                        %error,
                        "undo applied but its audit record was not appended"
                    );
                    outcome.audit_error = Some(error.to_string());
                }
            }
        }
        Ok(outcome)
    }
}
