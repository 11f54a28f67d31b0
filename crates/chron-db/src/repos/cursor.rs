//! Lazy, restartable history cursors.
//!
//! A cursor fetches one page at a time using keyset pagination on
//! `(version, created_at, seq)`, so walking a long history never loads it all
//! and never skips or repeats rows when other writers append meanwhile.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use chron_core::entities::AuditRecord;
use chron_core::enums::{AuditAction, SortOrder};
use chron_core::target::TargetRef;

use crate::error::DatabaseError;
use crate::helpers::{CREATED_AT_KEY, format_timestamp};
use crate::repos::audit::{AUDIT_COLUMNS, row_to_stored};
use crate::service::AuditService;

/// Filter and ordering options for [`AuditService::query`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    pub order: SortOrder,
    pub from_version: Option<i64>,
    pub to_version: Option<i64>,
    pub up_until: Option<DateTime<Utc>>,
    pub action: Option<AuditAction>,
    pub limit: Option<u32>,
}

impl AuditQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    #[must_use]
    pub const fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub const fn from_version(mut self, version: i64) -> Self {
        self.from_version = Some(version);
        self
    }

    #[must_use]
    pub const fn to_version(mut self, version: i64) -> Self {
        self.to_version = Some(version);
        self
    }

    #[must_use]
    pub const fn up_until(mut self, until: DateTime<Utc>) -> Self {
        self.up_until = Some(until);
        self
    }

    #[must_use]
    pub const fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Last row handed out, with `created_at` in canonical form.
#[derive(Debug, Clone)]
struct Key {
    version: i64,
    created_at: String,
    seq: i64,
}

/// A lazy walk over one target's history.
///
/// Finite: once a short page comes back the cursor is exhausted.
/// [`rewind`](Self::rewind) starts over from the first row.
pub struct AuditCursor<'a> {
    service: &'a AuditService,
    target: TargetRef,
    query: AuditQuery,
    buffer: VecDeque<(Key, AuditRecord)>,
    last: Option<Key>,
    yielded: u32,
    exhausted: bool,
}

impl AuditService {
    /// Open a cursor over `target`'s history. No query runs until the first
    /// [`AuditCursor::next_record`].
    #[must_use]
    pub fn query(&self, target: &TargetRef, query: AuditQuery) -> AuditCursor<'_> {
        AuditCursor {
            service: self,
            target: target.clone(),
            query,
            buffer: VecDeque::new(),
            last: None,
            yielded: 0,
            exhausted: false,
        }
    }
}

impl AuditCursor<'_> {
    /// The next record, fetching another page when the buffer runs dry.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the page query fails or a row cannot be parsed.
    pub async fn next_record(&mut self) -> Result<Option<AuditRecord>, DatabaseError> {
        if self.query.limit.is_some_and(|limit| self.yielded >= limit) {
            return Ok(None);
        }
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        match self.buffer.pop_front() {
            Some((key, record)) => {
                self.last = Some(key);
                self.yielded += 1;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Drain the remaining records.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a page query fails.
    pub async fn collect_all(mut self) -> Result<Vec<AuditRecord>, DatabaseError> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// Start again from the first matching row.
    pub fn rewind(&mut self) {
        self.buffer.clear();
        self.last = None;
        self.yielded = 0;
        self.exhausted = false;
    }

    #[must_use]
    pub const fn target(&self) -> &TargetRef {
        &self.target
    }

    fn page_len(&self) -> u32 {
        let page = self.service.page_size();
        self.query
            .limit
            .map_or(page, |limit| page.min(limit.saturating_sub(self.yielded)))
    }

    async fn fetch_page(&mut self) -> Result<(), DatabaseError> {
        let mut conditions = vec!["target_type = ?1".to_string(), "target_id = ?2".to_string()];
        let mut params: Vec<libsql::Value> = vec![
            libsql::Value::Text(self.target.kind.as_str().to_string()),
            libsql::Value::Text(self.target.id.clone()),
        ];

        if let Some(from) = self.query.from_version {
            params.push(libsql::Value::Integer(from));
            conditions.push(format!("version >= ?{}", params.len()));
        }
        if let Some(to) = self.query.to_version {
            params.push(libsql::Value::Integer(to));
            conditions.push(format!("version <= ?{}", params.len()));
        }
        if let Some(ref until) = self.query.up_until {
            params.push(libsql::Value::Text(format_timestamp(until)));
            conditions.push(format!("{CREATED_AT_KEY} <= ?{}", params.len()));
        }
        if let Some(action) = self.query.action {
            params.push(libsql::Value::Text(action.as_str().to_string()));
            conditions.push(format!("action = ?{}", params.len()));
        }

        let direction = self.query.order.as_sql();
        if let Some(ref key) = self.last {
            let cmp = match self.query.order {
                SortOrder::Ascending => ">",
                SortOrder::Descending => "<",
            };
            params.push(libsql::Value::Integer(key.version));
            let v = params.len();
            params.push(libsql::Value::Text(key.created_at.clone()));
            let c = params.len();
            params.push(libsql::Value::Integer(key.seq));
            let s = params.len();
            conditions.push(format!(
                "(version, {CREATED_AT_KEY}, seq) {cmp} (?{v}, ?{c}, ?{s})"
            ));
        }

        let page_len = self.page_len();
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audits WHERE {}
             ORDER BY version {direction}, {CREATED_AT_KEY} {direction}, seq {direction}
             LIMIT {page_len}",
            conditions.join(" AND ")
        );

        let mut rows = self.service.db().conn().query(&sql, params).await?;
        let mut fetched = 0u32;
        while let Some(row) = rows.next().await? {
            let stored = row_to_stored(&row)?;
            let key = Key {
                version: stored.record.version,
                created_at: format_timestamp(&stored.record.created_at),
                seq: stored.seq,
            };
            self.buffer.push_back((key, stored.record));
            fetched += 1;
        }
        self.exhausted = fetched < page_len;
        tracing::trace!(target_ref = %self.target, fetched, "audit page fetched");
        Ok(())
    }
}
