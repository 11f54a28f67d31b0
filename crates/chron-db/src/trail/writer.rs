//! JSONL trail writer.
//!
//! Appends `AuditRecord`s to per-target-type `{trail_dir}/{target_type}.jsonl`
//! files. Uses `serde_jsonlines::append_json_lines` for per-line appends.

use std::path::{Path, PathBuf};

use chron_core::entities::AuditRecord;
use chron_core::target::TargetType;

use crate::error::DatabaseError;

/// Appends audit records to per-target-type JSONL files.
pub struct TrailWriter {
    trail_dir: PathBuf,
    enabled: bool,
}

impl TrailWriter {
    /// Create a new `TrailWriter` pointing at the given directory.
    ///
    /// Creates the directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be created.
    pub fn new(trail_dir: PathBuf) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(&trail_dir).map_err(|e| DatabaseError::Other(e.into()))?;
        Ok(Self {
            trail_dir,
            enabled: true,
        })
    }

    /// Create a disabled writer (for testing or when trail is not needed).
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            trail_dir: PathBuf::new(),
            enabled: false,
        }
    }

    /// Set whether writing is enabled.
    ///
    /// Disabled during rebuild to avoid re-writing replayed records.
    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether trail writing is currently enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append a record to its target type's JSONL file.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the file write fails.
    pub fn append(&self, record: &AuditRecord) -> Result<(), DatabaseError> {
        if !self.enabled {
            return Ok(());
        }

        let path = self.file_for(&record.target.kind);
        serde_jsonlines::append_json_lines(&path, [record])
            .map_err(|e| DatabaseError::Other(e.into()))?;
        Ok(())
    }

    /// Trail file holding records of `kind`.
    #[must_use]
    pub fn file_for(&self, kind: &TargetType) -> PathBuf {
        self.trail_dir.join(format!("{}.jsonl", file_stem(kind)))
    }

    /// The directory where trail files are stored.
    #[must_use]
    pub fn trail_dir(&self) -> &Path {
        &self.trail_dir
    }
}

/// Target type names become file stems. Anything outside `[A-Za-z0-9_-]`
/// (namespace separators, dots, slashes) is replaced with `_`.
fn file_stem(kind: &TargetType) -> String {
    let stem: String = kind
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() { "_".to_string() } else { stem }
}
