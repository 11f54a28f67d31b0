use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::actor::Actor;
use crate::enums::AuditAction;
use crate::payload::ChangePayload;
use crate::target::TargetRef;

/// An append-only record of one change to one target.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AuditRecord {
    pub id: String,
    #[serde(flatten)]
    pub target: TargetRef,
    pub action: AuditAction,
    pub version: i64,
    pub changes: ChangePayload,
    pub actor: Option<Actor>,
    pub comment: Option<String>,
    pub request_id: String,
    pub remote_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// The values this record leaves behind, per attribute.
    ///
    /// A delete has no post state, so it contributes the recorded pre-delete
    /// values: folding history through a delete ends at the last known state.
    #[must_use]
    pub fn new_attributes(&self) -> BTreeMap<String, Value> {
        self.changes
            .iter()
            .map(|(name, change)| {
                let value = match self.action {
                    AuditAction::Delete => change.old(),
                    AuditAction::Create | AuditAction::Update => change.new_value(),
                };
                (name.clone(), value.clone())
            })
            .collect()
    }

    /// The values before this change, per attribute.
    #[must_use]
    pub fn old_attributes(&self) -> BTreeMap<String, Value> {
        self.changes
            .iter()
            .map(|(name, change)| (name.clone(), change.old().clone()))
            .collect()
    }
}

/// Input to `append`. The store fills `id`, `created_at`, `version`, and
/// defaults the attribution fields from the ambient context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditRecord {
    pub id: Option<String>,
    pub target: TargetRef,
    pub action: AuditAction,
    pub changes: ChangePayload,
    pub actor: Option<Actor>,
    pub comment: Option<String>,
    pub request_id: Option<String>,
    pub remote_address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl NewAuditRecord {
    #[must_use]
    pub const fn new(target: TargetRef, action: AuditAction, changes: ChangePayload) -> Self {
        Self {
            id: None,
            target,
            action,
            changes,
            actor: None,
            comment: None,
            request_id: None,
            remote_address: None,
            created_at: None,
        }
    }

    #[must_use]
    pub const fn create(target: TargetRef, changes: ChangePayload) -> Self {
        Self::new(target, AuditAction::Create, changes)
    }

    #[must_use]
    pub const fn update(target: TargetRef, changes: ChangePayload) -> Self {
        Self::new(target, AuditAction::Update, changes)
    }

    #[must_use]
    pub const fn delete(target: TargetRef, changes: ChangePayload) -> Self {
        Self::new(target, AuditAction::Delete, changes)
    }

    #[must_use]
    pub fn actor(mut self, actor: impl Into<Actor>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    #[must_use]
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn remote_address(mut self, remote_address: impl Into<String>) -> Self {
        self.remote_address = Some(remote_address.into());
        self
    }

    #[must_use]
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Result of an append.
///
/// `Suppressed` means tracking is currently off. It is neither a failure nor
/// a recorded change.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum AppendOutcome {
    Recorded(Box<AuditRecord>),
    Suppressed,
}

impl AppendOutcome {
    #[must_use]
    pub const fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed)
    }

    #[must_use]
    pub fn record(&self) -> Option<&AuditRecord> {
        match self {
            Self::Recorded(record) => Some(record.as_ref()),
            Self::Suppressed => None,
        }
    }

    #[must_use]
    pub fn into_record(self) -> Option<AuditRecord> {
        match self {
            Self::Recorded(record) => Some(*record),
            Self::Suppressed => None,
        }
    }
}
