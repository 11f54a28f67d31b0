//! Cross-cutting error types for Chronicle.
//!
//! Domain-specific errors (`DatabaseError`, `CodecError`, `UndoError`) are
//! defined in their respective crates. The CLI converges everything with
//! `anyhow`.

use thiserror::Error;

/// Errors that can be raised by any Chronicle crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Lookup returned no result.
    #[error("Not found: {kind} {id}")]
    NotFound { kind: String, id: String },

    /// An audit record failed validation (missing identity, bad field).
    #[error("Validation error: {0}")]
    Validation(String),

    /// An action string outside `create | update | delete`.
    #[error("Invalid audit action: '{0}'")]
    InvalidAction(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
