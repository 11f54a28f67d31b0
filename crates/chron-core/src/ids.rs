//! ID prefixes and random token helpers.
//!
//! Audit IDs are generated by the database (`randomblob`) with a prefix, e.g.
//! `aud-5e0c9a17d4b2f386`. Request correlation tokens are generated here because they
//! are minted before any database round trip.

use chrono::Utc;

pub const PREFIX_AUDIT: &str = "aud";
pub const PREFIX_REQUEST: &str = "req";

/// Format a prefixed ID from a prefix and a hex body.
#[must_use]
pub fn format_id(prefix: &str, hex: &str) -> String {
    format!("{prefix}-{hex}")
}

/// Mint a fresh request correlation token, e.g. `req-9c41f0d27ab3e655`.
///
/// Falls back to the current timestamp in nanoseconds when the OS random
/// source is unavailable.
#[must_use]
pub fn request_token() -> String {
    let mut bytes = [0u8; 8];
    let hex = match getrandom::fill(&mut bytes) {
        Ok(()) => bytes.iter().map(|b| format!("{b:02x}")).collect::<String>(),
        Err(_) => {
            let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
            format!("{nanos:016x}")
        }
    };
    format_id(PREFIX_REQUEST, &hex)
}
