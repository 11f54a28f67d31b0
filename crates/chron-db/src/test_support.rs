//! Shared test utilities for chron-db unit tests.

#[cfg(test)]
pub(crate) mod helpers {
    use chron_core::entities::{AuditRecord, NewAuditRecord};
    use chron_core::payload::ChangePayload;
    use chron_core::target::TargetRef;
    use serde_json::json;

    use crate::ChronDb;
    use crate::service::AuditService;
    use crate::trail::writer::TrailWriter;

    /// Create an in-memory AuditService with trail disabled (for pure DB tests).
    pub async fn test_service() -> AuditService {
        let db = ChronDb::open_local(":memory:").await.unwrap();
        AuditService::from_db(db, TrailWriter::disabled())
    }

    /// Create an in-memory AuditService with trail enabled writing to a temp dir.
    pub async fn test_service_with_trail(trail_dir: std::path::PathBuf) -> AuditService {
        let db = ChronDb::open_local(":memory:").await.unwrap();
        let trail = TrailWriter::new(trail_dir).unwrap();
        AuditService::from_db(db, trail)
    }

    pub fn widget(id: impl ToString) -> TargetRef {
        TargetRef::new("Widget", id)
    }

    /// Append `create {name: [null, name]}` and return the stored record.
    pub async fn create_widget(svc: &AuditService, id: &str, name: &str) -> AuditRecord {
        let changes = ChangePayload::new().with("name", json!(null), json!(name));
        svc.append(NewAuditRecord::create(widget(id), changes))
            .await
            .unwrap()
            .into_record()
            .unwrap()
    }

    /// Append `update {name: [old, new]}` and return the stored record.
    pub async fn rename_widget(svc: &AuditService, id: &str, old: &str, new: &str) -> AuditRecord {
        let changes = ChangePayload::new().with("name", json!(old), json!(new));
        svc.append(NewAuditRecord::update(widget(id), changes))
            .await
            .unwrap()
            .into_record()
            .unwrap()
    }
}
