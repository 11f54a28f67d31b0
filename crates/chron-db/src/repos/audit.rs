//! Audit store repository.
//!
//! Append-only audit records. Every append is a single `INSERT … SELECT`
//! that assigns the next per-target version and returns it, so concurrent
//! appenders never observe or produce a gap.

use std::collections::BTreeSet;

use chrono::Utc;
use chron_core::actor::Actor;
use chron_core::entities::{AppendOutcome, AuditRecord, NewAuditRecord};
use chron_core::enums::AuditAction;
use chron_core::ids::{self, PREFIX_AUDIT};
use chron_core::target::{TargetRef, TargetType};

use crate::codec::PayloadCodec;
use crate::context;
use crate::error::DatabaseError;
use crate::helpers::{
    CREATED_AT_KEY, format_timestamp, get_opt_string, opt_text, parse_datetime,
};
use crate::repos::cursor::AuditQuery;
use crate::service::AuditService;

pub(crate) const AUDIT_COLUMNS: &str = "seq, id, target_type, target_id, action, version, \
     audited_changes, actor_type, actor_id, actor_name, comment, request_id, remote_address, \
     created_at";

/// A row as read back, with the append sequence cursors paginate on.
pub(crate) struct StoredAudit {
    pub seq: i64,
    pub record: AuditRecord,
}

pub(crate) fn row_to_stored(row: &libsql::Row) -> Result<StoredAudit, DatabaseError> {
    let record = AuditRecord {
        id: row.get::<String>(1)?,
        target: TargetRef::new(row.get::<String>(2)?, row.get::<String>(3)?),
        action: row.get::<String>(4)?.parse::<AuditAction>()?,
        version: row.get::<i64>(5)?,
        changes: PayloadCodec::decode(&row.get_value(6)?)?,
        actor: Actor::from_columns(
            get_opt_string(row, 7)?,
            get_opt_string(row, 8)?,
            get_opt_string(row, 9)?,
        ),
        comment: get_opt_string(row, 10)?,
        request_id: row.get::<String>(11)?,
        remote_address: get_opt_string(row, 12)?,
        created_at: parse_datetime(&row.get::<String>(13)?)?,
    };
    Ok(StoredAudit {
        seq: row.get::<i64>(0)?,
        record,
    })
}

fn actor_params(actor: Option<&Actor>) -> [libsql::Value; 3] {
    let (kind, id, name) = actor.map_or((None, None, None), Actor::to_columns);
    [opt_text(kind), opt_text(id), opt_text(name)]
}

impl AuditService {
    /// Append an audit record.
    ///
    /// Fills `id` and `created_at` when absent and defaults actor, request id,
    /// and remote address from the ambient [`context`]. A request id is minted
    /// when neither the record nor the context carries one.
    ///
    /// Returns `AppendOutcome::Suppressed` without writing when tracking is
    /// disabled on this service or the calling task is inside
    /// [`context::without_auditing`]. The target is validated first either way.
    ///
    /// A failed trail write is logged and does not fail the append.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Core` for a blank target identity, or
    /// `DatabaseError` if encoding or the INSERT fails.
    pub async fn append(&self, record: NewAuditRecord) -> Result<AppendOutcome, DatabaseError> {
        record.target.validate()?;

        let ambient = context::current().unwrap_or_default();
        if !self.is_enabled() || ambient.suppressed {
            tracing::debug!(target_ref = %record.target, action = %record.action, "audit suppressed");
            return Ok(AppendOutcome::Suppressed);
        }

        let id = match record.id {
            Some(id) => id,
            None => self.db().generate_id(PREFIX_AUDIT).await?,
        };
        let actor = record.actor.or(ambient.actor);
        let request_id = record
            .request_id
            .or(ambient.request_id)
            .unwrap_or_else(ids::request_token);
        let remote_address = record.remote_address.or(ambient.remote_address);
        // Round-trip through the stored form so the returned record equals a re-read.
        let created_at = format_timestamp(&record.created_at.unwrap_or_else(Utc::now));

        let [actor_type, actor_id, actor_name] = actor_params(actor.as_ref());
        let params = vec![
            libsql::Value::Text(id.clone()),
            libsql::Value::Text(record.target.kind.as_str().to_string()),
            libsql::Value::Text(record.target.id.clone()),
            libsql::Value::Text(record.action.as_str().to_string()),
            self.codec().encode(&record.changes)?.into_value(),
            actor_type,
            actor_id,
            actor_name,
            opt_text(record.comment.as_deref()),
            libsql::Value::Text(request_id.clone()),
            opt_text(remote_address.as_deref()),
            libsql::Value::Text(created_at.clone()),
        ];

        let mut rows = self
            .db()
            .conn()
            .query(
                "INSERT INTO audits (id, target_type, target_id, action, version, audited_changes,
                                     actor_type, actor_id, actor_name, comment, request_id,
                                     remote_address, created_at)
                 SELECT ?1, ?2, ?3, ?4, COALESCE(MAX(version), 0) + 1, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12
                 FROM audits WHERE target_type = ?2 AND target_id = ?3
                 RETURNING version",
                params,
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        let version = row.get::<i64>(0)?;
        drop(rows);

        let audit = AuditRecord {
            id,
            target: record.target,
            action: record.action,
            version,
            changes: record.changes,
            actor,
            comment: record.comment,
            request_id,
            remote_address,
            created_at: parse_datetime(&created_at)?,
        };

        // The row is committed; a trail failure only leaves a gap in the mirror.
        if let Err(error) = self.trail().append(&audit) {
            tracing::warn!(
                id = %audit.id,
                target_ref = %audit.target,
                %error,
                "audit recorded but trail write failed"
            );
        }
        tracing::debug!(
            id = %audit.id,
            target_ref = %audit.target,
            action = %audit.action,
            version = audit.version,
            "audit recorded"
        );
        Ok(AppendOutcome::Recorded(Box::new(audit)))
    }

    /// Insert a record exactly as given, keeping its id, version, and
    /// timestamp. Used to rebuild the store from the trail.
    ///
    /// Returns `false` when a record with the same id or the same
    /// `(target, version)` already exists.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if encoding or the INSERT fails.
    pub async fn insert_existing(&self, record: &AuditRecord) -> Result<bool, DatabaseError> {
        record.target.validate()?;
        let [actor_type, actor_id, actor_name] = actor_params(record.actor.as_ref());
        let inserted = self
            .db()
            .conn()
            .execute(
                "INSERT OR IGNORE INTO audits (id, target_type, target_id, action, version,
                                               audited_changes, actor_type, actor_id, actor_name,
                                               comment, request_id, remote_address, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                vec![
                    libsql::Value::Text(record.id.clone()),
                    libsql::Value::Text(record.target.kind.as_str().to_string()),
                    libsql::Value::Text(record.target.id.clone()),
                    libsql::Value::Text(record.action.as_str().to_string()),
                    libsql::Value::Integer(record.version),
                    self.codec().encode(&record.changes)?.into_value(),
                    actor_type,
                    actor_id,
                    actor_name,
                    opt_text(record.comment.as_deref()),
                    libsql::Value::Text(record.request_id.clone()),
                    opt_text(record.remote_address.as_deref()),
                    libsql::Value::Text(format_timestamp(&record.created_at)),
                ],
            )
            .await?;
        Ok(inserted > 0)
    }

    /// Fetch one record by id.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or the row cannot be parsed.
    pub async fn get(&self, id: &str) -> Result<Option<AuditRecord>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {AUDIT_COLUMNS} FROM audits WHERE id = ?1"),
                [id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_stored(&row)?.record)),
            None => Ok(None),
        }
    }

    /// Records of `record`'s target up to and including its version, oldest
    /// first. Records sharing a version keep append order.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a page query fails.
    pub async fn ancestors_of(
        &self,
        record: &AuditRecord,
    ) -> Result<Vec<AuditRecord>, DatabaseError> {
        self.query(&record.target, AuditQuery::new().to_version(record.version))
            .collect_all()
            .await
    }

    /// The most recent record of a target, if any.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn latest(&self, target: &TargetRef) -> Result<Option<AuditRecord>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {AUDIT_COLUMNS} FROM audits
                     WHERE target_type = ?1 AND target_id = ?2
                     ORDER BY version DESC, {CREATED_AT_KEY} DESC, seq DESC LIMIT 1"
                ),
                [target.kind.as_str(), target.id.as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_stored(&row)?.record)),
            None => Ok(None),
        }
    }

    /// Every record appended under one request id, in append order.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn for_request(&self, request_id: &str) -> Result<Vec<AuditRecord>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {AUDIT_COLUMNS} FROM audits WHERE request_id = ?1 ORDER BY seq"),
                [request_id],
            )
            .await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_stored(&row)?.record);
        }
        Ok(records)
    }

    /// Every target type that has at least one record.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn distinct_tracked_types(&self) -> Result<BTreeSet<TargetType>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query("SELECT DISTINCT target_type FROM audits", ())
            .await?;
        let mut types = BTreeSet::new();
        while let Some(row) = rows.next().await? {
            types.insert(TargetType::new(row.get::<String>(0)?));
        }
        Ok(types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{
        create_widget, rename_widget, test_service, test_service_with_trail, widget,
    };
    use chron_core::errors::CoreError;
    use chron_core::payload::ChangePayload;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn append_assigns_id_version_and_request() {
        let svc = test_service().await;
        let record = create_widget(&svc, "7", "Bolt").await;

        assert!(record.id.starts_with("aud-"));
        assert_eq!(record.version, 1);
        assert_eq!(record.action, AuditAction::Create);
        assert!(record.request_id.starts_with("req-"));
        assert_eq!(record.actor, None);
    }

    #[tokio::test]
    async fn versions_increment_per_target() {
        let svc = test_service().await;
        create_widget(&svc, "1", "Bolt").await;
        let second = rename_widget(&svc, "1", "Bolt", "Screw").await;
        let other = create_widget(&svc, "2", "Nut").await;

        assert_eq!(second.version, 2);
        assert_eq!(other.version, 1);
    }

    #[tokio::test]
    async fn returned_record_matches_stored_row() {
        let svc = test_service().await;
        let record = create_widget(&svc, "7", "Bolt").await;
        assert_eq!(svc.get(&record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn explicit_fields_are_kept() {
        let svc = test_service().await;
        let outcome = svc
            .append(
                NewAuditRecord::update(widget("7"), ChangePayload::new())
                    .with_id("aud-fixed001")
                    .actor(Actor::identified("User", "42"))
                    .comment("bulk fix")
                    .request_id("req-abc")
                    .remote_address("10.0.0.1"),
            )
            .await
            .unwrap();
        let record = svc.get("aud-fixed001").await.unwrap().unwrap();

        assert_eq!(outcome.record(), Some(&record));
        assert_eq!(record.actor, Some(Actor::identified("User", "42")));
        assert_eq!(record.comment.as_deref(), Some("bulk fix"));
        assert_eq!(record.request_id, "req-abc");
        assert_eq!(record.remote_address.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn blank_target_is_rejected() {
        let svc = test_service().await;
        let err = svc
            .append(NewAuditRecord::create(
                TargetRef::new("Widget", ""),
                ChangePayload::new(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn blank_target_is_rejected_while_disabled() {
        let svc = test_service().await;
        svc.set_enabled(false);
        let err = svc
            .append(NewAuditRecord::create(
                TargetRef::new("", "7"),
                ChangePayload::new(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn trail_failure_keeps_the_stored_record() {
        let dir = tempfile::TempDir::new().unwrap();
        let svc = test_service_with_trail(dir.path().to_path_buf()).await;
        // A directory where the trail file should be makes every write fail.
        std::fs::create_dir(svc.trail().file_for(&widget("7").kind)).unwrap();

        let outcome = svc
            .append(NewAuditRecord::create(
                widget("7"),
                ChangePayload::new().with("name", json!(null), json!("Bolt")),
            ))
            .await
            .unwrap();
        let record = outcome.into_record().unwrap();
        assert_eq!(svc.get(&record.id).await.unwrap(), Some(record));

        let next = rename_widget(&svc, "7", "Bolt", "Screw").await;
        assert_eq!(next.version, 2);
        let stored = svc
            .query(&widget("7"), AuditQuery::new())
            .collect_all()
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn disabled_service_suppresses() {
        let svc = test_service().await;
        svc.set_enabled(false);
        let outcome = svc
            .append(NewAuditRecord::create(widget("7"), ChangePayload::new()))
            .await
            .unwrap();
        assert!(outcome.is_suppressed());
        assert!(svc.distinct_tracked_types().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn without_auditing_suppresses() {
        let svc = test_service().await;
        let outcome = context::without_auditing(svc.append(NewAuditRecord::create(
            widget("7"),
            ChangePayload::new(),
        )))
        .await
        .unwrap();
        assert!(outcome.is_suppressed());
        assert!(svc.latest(&widget("7")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ambient_context_fills_attribution() {
        let svc = test_service().await;
        let ctx = context::AuditContext::new()
            .actor("alice")
            .request_id("req-ctx")
            .remote_address("192.0.2.1");
        let record = context::scope(ctx, create_widget(&svc, "7", "Bolt")).await;

        assert_eq!(record.actor, Some(Actor::named("alice")));
        assert_eq!(record.request_id, "req-ctx");
        assert_eq!(record.remote_address.as_deref(), Some("192.0.2.1"));
    }

    #[tokio::test]
    async fn explicit_actor_beats_ambient() {
        let svc = test_service().await;
        let record = context::with_actor("alice", async {
            svc.append(
                NewAuditRecord::create(widget("7"), ChangePayload::new()).actor("system"),
            )
            .await
            .unwrap()
            .into_record()
            .unwrap()
        })
        .await;
        assert_eq!(record.actor, Some(Actor::named("system")));
    }

    #[tokio::test]
    async fn records_are_immutable() {
        let svc = test_service().await;
        let record = create_widget(&svc, "7", "Bolt").await;

        let update = svc
            .db()
            .conn()
            .execute(
                "UPDATE audits SET comment = 'tampered' WHERE id = ?1",
                [record.id.as_str()],
            )
            .await;
        assert!(update.is_err());

        let delete = svc
            .db()
            .conn()
            .execute("DELETE FROM audits WHERE id = ?1", [record.id.as_str()])
            .await;
        assert!(delete.is_err());

        assert_eq!(svc.get(&record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn unknown_stored_action_is_invalid() {
        let svc = test_service().await;
        svc.db()
            .conn()
            .execute(
                "INSERT INTO audits (id, target_type, target_id, action, version, request_id, created_at)
                 VALUES ('aud-legacy01', 'Widget', '9', 'archive', 1, 'req-x', '2026-01-01 00:00:00')",
                (),
            )
            .await
            .unwrap();

        let err = svc.get("aud-legacy01").await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Core(CoreError::InvalidAction(ref a)) if a == "archive"
        ));
    }

    #[tokio::test]
    async fn legacy_destroy_spelling_reads_as_delete() {
        let svc = test_service().await;
        svc.db()
            .conn()
            .execute(
                "INSERT INTO audits (id, target_type, target_id, action, version, audited_changes, request_id, created_at)
                 VALUES ('aud-legacy02', 'Widget', '9', 'destroy', 1, '{\"name\":[\"Bolt\",null]}', 'req-x', '2026-01-01 00:00:00')",
                (),
            )
            .await
            .unwrap();

        let record = svc.get("aud-legacy02").await.unwrap().unwrap();
        assert_eq!(record.action, AuditAction::Delete);
        assert_eq!(record.new_attributes()["name"], json!("Bolt"));
    }

    #[tokio::test]
    async fn ancestors_are_version_ordered() {
        let svc = test_service().await;
        create_widget(&svc, "7", "Bolt").await;
        rename_widget(&svc, "7", "Bolt", "Screw").await;
        let third = rename_widget(&svc, "7", "Screw", "Nail").await;
        rename_widget(&svc, "7", "Nail", "Rivet").await;

        let ancestors = svc.ancestors_of(&third).await.unwrap();
        let versions: Vec<i64> = ancestors.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn mixed_encodings_read_back_alike() {
        let text = test_service().await;
        create_widget(&text, "1", "Bolt").await;
        let svc = text.with_codec(PayloadCodec::Structured);
        create_widget(&svc, "2", "Bolt").await;

        let a = svc.latest(&widget("1")).await.unwrap().unwrap();
        let b = svc.latest(&widget("2")).await.unwrap().unwrap();
        assert_eq!(a.changes, b.changes);
    }

    #[tokio::test]
    async fn latest_returns_highest_version() {
        let svc = test_service().await;
        create_widget(&svc, "7", "Bolt").await;
        let last = rename_widget(&svc, "7", "Bolt", "Screw").await;
        assert_eq!(svc.latest(&widget("7")).await.unwrap(), Some(last));
        assert_eq!(svc.latest(&widget("8")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn for_request_groups_one_operation() {
        let svc = test_service().await;
        let (a, b) = context::with_actor("alice", async {
            (
                create_widget(&svc, "1", "Bolt").await,
                create_widget(&svc, "2", "Nut").await,
            )
        })
        .await;
        create_widget(&svc, "3", "Screw").await;

        assert_eq!(a.request_id, b.request_id);
        let grouped = svc.for_request(&a.request_id).await.unwrap();
        assert_eq!(grouped, vec![a, b]);
    }

    #[tokio::test]
    async fn distinct_types_are_deduplicated() {
        let svc = test_service().await;
        create_widget(&svc, "1", "Bolt").await;
        create_widget(&svc, "2", "Nut").await;
        svc.append(NewAuditRecord::create(
            TargetRef::new("Gadget", "1"),
            ChangePayload::new(),
        ))
        .await
        .unwrap()
        .into_record()
        .unwrap();

        let types: Vec<String> = svc
            .distinct_tracked_types()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(types, vec!["Gadget".to_string(), "Widget".to_string()]);
    }

    #[tokio::test]
    async fn insert_existing_is_idempotent() {
        let svc = test_service().await;
        let record = create_widget(&svc, "7", "Bolt").await;
        assert!(!svc.insert_existing(&record).await.unwrap());

        let other = test_service().await;
        assert!(other.insert_existing(&record).await.unwrap());
        assert_eq!(other.get(&record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn structured_codec_roundtrips_through_store() {
        let svc = test_service().await.with_codec(PayloadCodec::Structured);
        let changes = ChangePayload::new()
            .with("tags", json!(null), json!(["x", {"y": [1, null]}]))
            .with("note", json!(null), json!(null));
        let record = svc
            .append(NewAuditRecord::create(widget("7"), changes.clone()))
            .await
            .unwrap()
            .into_record()
            .unwrap();

        let stored = svc.get(&record.id).await.unwrap().unwrap();
        assert_eq!(stored.changes, changes);
    }
}
