//! Change payload codec.
//!
//! A payload has one logical shape (attribute → `[old, new]`) and two
//! physical encodings: JSON text in a TEXT column, or JSON bytes in a
//! BLOB/JSON-native column. Decoding accepts either form whatever the
//! configured strategy, so a store can switch strategies without rewriting
//! history.

use chron_core::enums::PayloadEncoding;
use chron_core::payload::{Change, ChangePayload};
use serde::Serialize;
use thiserror::Error;

/// Errors from payload encoding and decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A raw value could not be represented as JSON.
    #[error("Cannot encode attribute '{attribute}': {source}")]
    Unserializable {
        attribute: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode change payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode change payload: {0}")]
    Decode(#[source] serde_json::Error),

    /// The column held a value that is neither text, bytes, nor NULL.
    #[error("Unsupported payload column value: {0}")]
    UnsupportedColumn(&'static str),
}

/// Physical strategy for the `audited_changes` column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PayloadCodec {
    #[default]
    Text,
    Structured,
}

/// An encoded payload ready to bind as a column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedPayload {
    Text(String),
    Structured(Vec<u8>),
}

impl EncodedPayload {
    #[must_use]
    pub fn into_value(self) -> libsql::Value {
        match self {
            Self::Text(s) => libsql::Value::Text(s),
            Self::Structured(bytes) => libsql::Value::Blob(bytes),
        }
    }
}

impl PayloadCodec {
    /// Map a declared SQL column type to the strategy it supports.
    #[must_use]
    pub fn from_declared_type(declared: &str) -> Self {
        let declared = declared.trim().to_ascii_uppercase();
        if declared.contains("JSON") || declared.contains("BLOB") {
            Self::Structured
        } else {
            Self::Text
        }
    }

    /// Resolve a configured encoding against the column capability.
    #[must_use]
    pub const fn resolve(setting: PayloadEncoding, capability: Self) -> Self {
        match setting {
            PayloadEncoding::Auto => capability,
            PayloadEncoding::Text => Self::Text,
            PayloadEncoding::Structured => Self::Structured,
        }
    }

    /// Encode a payload for storage.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if serialization fails.
    pub fn encode(self, payload: &ChangePayload) -> Result<EncodedPayload, CodecError> {
        match self {
            Self::Text => serde_json::to_string(payload)
                .map(EncodedPayload::Text)
                .map_err(CodecError::Encode),
            Self::Structured => serde_json::to_vec(payload)
                .map(EncodedPayload::Structured)
                .map_err(CodecError::Encode),
        }
    }

    /// Decode a stored column value. NULL and empty values decode to an
    /// empty payload.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Decode` for malformed JSON and
    /// `CodecError::UnsupportedColumn` for numeric column values.
    pub fn decode(stored: &libsql::Value) -> Result<ChangePayload, CodecError> {
        match stored {
            libsql::Value::Null => Ok(ChangePayload::new()),
            libsql::Value::Text(s) if s.trim().is_empty() => Ok(ChangePayload::new()),
            libsql::Value::Text(s) => serde_json::from_str(s).map_err(CodecError::Decode),
            libsql::Value::Blob(b) if b.is_empty() => Ok(ChangePayload::new()),
            libsql::Value::Blob(b) => serde_json::from_slice(b).map_err(CodecError::Decode),
            libsql::Value::Integer(_) => Err(CodecError::UnsupportedColumn("integer")),
            libsql::Value::Real(_) => Err(CodecError::UnsupportedColumn("real")),
        }
    }
}

/// Build a payload from raw `(attribute, (old, new))` pairs of any
/// serializable values.
///
/// # Errors
///
/// Returns `CodecError::Unserializable` naming the first attribute whose
/// value has no JSON form (e.g. a map with non-string keys).
pub fn encode_changes<I, K, O, N>(raw: I) -> Result<ChangePayload, CodecError>
where
    I: IntoIterator<Item = (K, (O, N))>,
    K: Into<String>,
    O: Serialize,
    N: Serialize,
{
    raw.into_iter()
        .map(|(attribute, (old, new))| {
            let attribute = attribute.into();
            let old = serde_json::to_value(old);
            let new = serde_json::to_value(new);
            match (old, new) {
                (Ok(old), Ok(new)) => Ok((attribute, Change::new(old, new))),
                (Err(source), _) | (_, Err(source)) => {
                    Err(CodecError::Unserializable { attribute, source })
                }
            }
        })
        .collect()
}
