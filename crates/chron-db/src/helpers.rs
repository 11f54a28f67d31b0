//! Row-to-entity parsing helpers.
//!
//! Timestamps are written as RFC 3339 with microsecond precision and a `Z`
//! suffix, so lexical order matches chronological order. Reading also accepts
//! `SQLite`'s `datetime('now')` format for rows written by other tools.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::DatabaseError;

/// `created_at` in canonical form for comparisons in SQL.
///
/// Rows in `SQLite`'s `YYYY-MM-DD HH:MM:SS` format are rewritten to the
/// [`format_timestamp`] shape so they order correctly against RFC 3339 values.
pub const CREATED_AT_KEY: &str = "(CASE WHEN created_at GLOB \
     '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9] [0-9][0-9]:[0-9][0-9]:[0-9][0-9]' \
     THEN strftime('%Y-%m-%dT%H:%M:%S.000000Z', created_at) ELSE created_at END)";

/// Format a timestamp the way every `created_at` column is written.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a required TEXT column as `DateTime<Utc>`.
///
/// Handles both RFC 3339 (`"2026-02-09T14:30:00.000000Z"`) and `SQLite`'s
/// default format (`"2026-02-09 14:30:00"`).
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string cannot be parsed as either format.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Query(format!("Failed to parse datetime '{s}': {e}")))
}

/// Read a nullable TEXT column. Returns `None` for both SQL NULL and empty string.
///
/// `row.get::<String>(idx)` on a NULL column returns an error, not `""`.
///
/// # Errors
///
/// Returns `DatabaseError` if the column read fails.
pub fn get_opt_string(row: &libsql::Row, idx: i32) -> Result<Option<String>, DatabaseError> {
    match row.get::<Option<String>>(idx)? {
        Some(s) if s.is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// Bind an optional string as TEXT or NULL.
#[must_use]
pub fn opt_text(value: Option<&str>) -> libsql::Value {
    value.map_or(libsql::Value::Null, |s| libsql::Value::Text(s.to_string()))
}
