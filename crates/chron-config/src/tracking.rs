//! Change-tracking behavior.

use serde::{Deserialize, Serialize};

const fn default_enabled() -> bool {
    true
}

/// Rows fetched per page by lazy audit cursors.
const fn default_page_size() -> u32 {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackingConfig {
    /// When `false`, every append is suppressed until re-enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Record an audit entry for the inverse change applied by undo.
    #[serde(default)]
    pub audit_undo: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            page_size: default_page_size(),
            audit_undo: false,
        }
    }
}
