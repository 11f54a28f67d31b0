use std::path::{Path, PathBuf};

use chron_core::entities::AuditRecord;
use serde::Serialize;

use crate::error::DatabaseError;
use crate::service::AuditService;

/// Summary of a rebuild from the trail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub trail_files: u32,
    /// Records inserted into the store.
    pub records_replayed: u32,
    /// Records already present (same id or same target version).
    pub records_skipped: u32,
    /// Lines that could not be parsed as an audit record.
    pub lines_rejected: u32,
    pub duration_ms: u64,
}

pub struct TrailReplayer;

impl TrailReplayer {
    /// Re-insert every record found in `trail_dir` into the service's store.
    ///
    /// Idempotent: records keep their id, version, and timestamp, and rows
    /// already present are left alone. Trail writing is paused for the
    /// duration so replayed records are not mirrored again.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be read or an insert
    /// fails. Unparseable lines are logged and counted, not fatal.
    pub async fn rebuild(
        service: &mut AuditService,
        trail_dir: &Path,
    ) -> Result<RebuildReport, DatabaseError> {
        let start = std::time::Instant::now();

        let was_enabled = service.trail().is_enabled();
        service.trail_mut().set_enabled(false);
        let result = replay_dir(service, trail_dir).await;
        service.trail_mut().set_enabled(was_enabled);

        let mut report = result?;
        report.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            trail_files = report.trail_files,
            replayed = report.records_replayed,
            skipped = report.records_skipped,
            rejected = report.lines_rejected,
            duration_ms = report.duration_ms,
            "rebuilt audit store from trail"
        );
        Ok(report)
    }
}

fn trail_files(trail_dir: &Path) -> Result<Vec<PathBuf>, DatabaseError> {
    let entries = std::fs::read_dir(trail_dir).map_err(|e| DatabaseError::Other(e.into()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DatabaseError::Other(e.into()))?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn replay_dir(
    service: &AuditService,
    trail_dir: &Path,
) -> Result<RebuildReport, DatabaseError> {
    let mut report = RebuildReport::default();
    let mut records: Vec<AuditRecord> = Vec::new();

    for path in trail_files(trail_dir)? {
        report.trail_files += 1;
        let lines = match serde_jsonlines::json_lines::<AuditRecord, _>(&path) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable trail file");
                continue;
            }
        };
        for (line_no, line) in lines.enumerate() {
            match line {
                Ok(record) => records.push(record),
                Err(e) => {
                    report.lines_rejected += 1;
                    tracing::warn!(
                        path = %path.display(),
                        line = line_no + 1,
                        error = %e,
                        "skipping malformed trail line"
                    );
                }
            }
        }
    }

    // Stable: records of one type keep their file (append) order on ties.
    records.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.target.cmp(&b.target))
            .then_with(|| a.version.cmp(&b.version))
    });

    for record in &records {
        if service.insert_existing(record).await? {
            report.records_replayed += 1;
        } else {
            report.records_skipped += 1;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{
        create_widget, rename_widget, test_service, test_service_with_trail, widget,
    };
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::TempDir;

    #[tokio::test]
    async fn rebuild_reproduces_store() {
        let dir = TempDir::new().unwrap();
        let source = test_service_with_trail(dir.path().to_path_buf()).await;
        let a = create_widget(&source, "7", "Bolt").await;
        let b = rename_widget(&source, "7", "Bolt", "Screw").await;

        let mut target = test_service().await;
        let report = TrailReplayer::rebuild(&mut target, dir.path()).await.unwrap();

        assert_eq!(report.trail_files, 1);
        assert_eq!(report.records_replayed, 2);
        assert_eq!(report.records_skipped, 0);
        assert_eq!(target.get(&a.id).await.unwrap(), Some(a));
        assert_eq!(target.latest(&widget("7")).await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn rebuild_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let source = test_service_with_trail(dir.path().to_path_buf()).await;
        create_widget(&source, "7", "Bolt").await;

        let mut target = test_service().await;
        TrailReplayer::rebuild(&mut target, dir.path()).await.unwrap();
        let again = TrailReplayer::rebuild(&mut target, dir.path()).await.unwrap();
        assert_eq!(again.records_replayed, 0);
        assert_eq!(again.records_skipped, 1);
    }

    #[tokio::test]
    async fn malformed_lines_are_counted() {
        let dir = TempDir::new().unwrap();
        let source = test_service_with_trail(dir.path().to_path_buf()).await;
        create_widget(&source, "7", "Bolt").await;

        let path = source.trail().file_for(&widget("7").kind);
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not a record").unwrap();

        let mut target = test_service().await;
        let report = TrailReplayer::rebuild(&mut target, dir.path()).await.unwrap();
        assert_eq!(report.records_replayed, 1);
        assert_eq!(report.lines_rejected, 1);
    }

    #[tokio::test]
    async fn rebuild_restores_trail_switch() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let mut svc = test_service_with_trail(other.path().to_path_buf()).await;
        TrailReplayer::rebuild(&mut svc, dir.path()).await.unwrap();
        assert!(svc.trail().is_enabled());
    }

    #[tokio::test]
    async fn missing_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut svc = test_service().await;
        let err = TrailReplayer::rebuild(&mut svc, &dir.path().join("absent")).await;
        assert!(err.is_err());
    }
}
