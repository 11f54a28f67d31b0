//! Actor attribution for audit records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to an identity that lives in another system (user table, IdP).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ExternalRef {
    pub kind: String,
    pub id: String,
}

/// Who performed a change.
///
/// Stored as `actor_name` for `Named`, or `actor_type` + `actor_id` for
/// `Identified`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// Free-form name, e.g. a username or a job name.
    Named(String),
    /// A reference into an external identity store.
    Identified(ExternalRef),
}

impl Actor {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    #[must_use]
    pub fn identified(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Identified(ExternalRef {
            kind: kind.into(),
            id: id.into(),
        })
    }

    /// Split into the `(actor_type, actor_id, actor_name)` storage columns.
    #[must_use]
    pub fn to_columns(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        match self {
            Self::Named(name) => (None, None, Some(name.as_str())),
            Self::Identified(r) => (Some(r.kind.as_str()), Some(r.id.as_str()), None),
        }
    }

    /// Rebuild from storage columns. An identified reference wins over a name.
    #[must_use]
    pub fn from_columns(
        actor_type: Option<String>,
        actor_id: Option<String>,
        actor_name: Option<String>,
    ) -> Option<Self> {
        match (actor_type, actor_id, actor_name) {
            (Some(kind), Some(id), _) => Some(Self::Identified(ExternalRef { kind, id })),
            (_, _, Some(name)) => Some(Self::Named(name)),
            _ => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Identified(r) => write!(f, "{}:{}", r.kind, r.id),
        }
    }
}

impl From<&str> for Actor {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for Actor {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<ExternalRef> for Actor {
    fn from(r: ExternalRef) -> Self {
        Self::Identified(r)
    }
}
