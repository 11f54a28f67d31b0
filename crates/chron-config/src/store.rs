//! Audit store configuration.

use chron_core::enums::PayloadEncoding;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default database location, relative to the project root.
fn default_path() -> String {
    ".chronicle/audit.db".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// libSQL database file, or `:memory:`.
    #[serde(default = "default_path")]
    pub path: String,

    /// Physical encoding of the change payload column (`auto`, `text`, `structured`).
    #[serde(default)]
    pub payload_encoding: PayloadEncoding,

    /// Directory for the JSONL trail mirror. Empty disables the trail.
    #[serde(default)]
    pub trail_dir: String,
}

impl StoreConfig {
    /// Returns `true` if the JSONL trail mirror should be written.
    #[must_use]
    pub fn trail_enabled(&self) -> bool {
        !self.trail_dir.is_empty()
    }

    #[must_use]
    pub fn trail_path(&self) -> Option<PathBuf> {
        self.trail_enabled().then(|| PathBuf::from(&self.trail_dir))
    }

    /// Whether the store lives only in memory.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:"
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            payload_encoding: PayloadEncoding::default(),
            trail_dir: String::new(),
        }
    }
}
