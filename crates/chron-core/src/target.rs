//! Polymorphic reference to an audited record.
//!
//! A target is identified by a `(kind, id)` pair and is never owned by its
//! audit records: the live record may have been deleted long ago.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::CoreError;

/// Name of an audited entity class, e.g. `"Widget"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TargetType(String);

impl TargetType {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetType {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl From<String> for TargetType {
    fn from(kind: String) -> Self {
        Self(kind)
    }
}

/// Identity of an audited record: entity kind plus record id.
///
/// Serialized flat as `target_type` / `target_id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct TargetRef {
    #[serde(rename = "target_type")]
    pub kind: TargetType,
    #[serde(rename = "target_id")]
    pub id: String,
}

impl TargetRef {
    #[must_use]
    pub fn new(kind: impl Into<TargetType>, id: impl ToString) -> Self {
        Self {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    /// Reject references with a blank kind or id.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` naming the missing field.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.kind.as_str().trim().is_empty() {
            return Err(CoreError::Validation("target_type is required".into()));
        }
        if self.id.trim().is_empty() {
            return Err(CoreError::Validation("target_id is required".into()));
        }
        Ok(())
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}
