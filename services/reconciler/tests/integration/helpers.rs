use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use stockroom_domain::asset::AssetSnapshot;
use stockroom_domain::pagination::PageRequest;
use stockroom_reconciler::domain::repository::{AssetSource, ReportRepository};
use stockroom_reconciler::domain::types::{
    AuditEvent, Discrepancy, RECON_DIFF_EVENT, ReconReport, ReportStatus,
};
use stockroom_reconciler::error::ReconcilerError;
use stockroom_reconciler::infra::expected_file::FsExpectedListReader;
use stockroom_reconciler::usecase::run::RunReconciliationUseCase;

// ── MockAssetSource ──────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockAssetSource {
    pub assets: Vec<AssetSnapshot>,
    pub fail: bool,
    reads: Arc<AtomicUsize>,
}

impl MockAssetSource {
    pub fn new(assets: Vec<AssetSnapshot>) -> Self {
        Self {
            assets,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl AssetSource for MockAssetSource {
    async fn list_assets(&self) -> Result<Vec<AssetSnapshot>, ReconcilerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow::anyhow!("connection refused").into());
        }
        Ok(self.assets.clone())
    }
}

// ── MockReportRepo ───────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockReportRepo {
    pub reports: Arc<Mutex<Vec<ReconReport>>>,
    pub audit: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MockReportRepo {
    pub fn reports_handle(&self) -> Arc<Mutex<Vec<ReconReport>>> {
        Arc::clone(&self.reports)
    }

    pub fn audit_handle(&self) -> Arc<Mutex<Vec<AuditEvent>>> {
        Arc::clone(&self.audit)
    }

    pub fn push_report(&self, run_at: DateTime<Utc>, status: ReportStatus) -> i32 {
        let mut reports = self.reports.lock().unwrap();
        let id = reports.len() as i32 + 1;
        reports.push(ReconReport {
            id,
            run_at,
            status,
            diff: serde_json::json!([]),
        });
        id
    }

    pub fn push_audit(&self, event_type: &str, created_at: DateTime<Utc>) -> i32 {
        let mut audit = self.audit.lock().unwrap();
        let id = audit.len() as i32 + 1;
        audit.push(AuditEvent {
            id,
            event_type: event_type.to_owned(),
            payload: None,
            created_at,
        });
        id
    }
}

fn page_of<T>(rows: Vec<T>, page: PageRequest) -> Vec<T> {
    rows.into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

impl ReportRepository for MockReportRepo {
    async fn record_run(
        &self,
        run_at: DateTime<Utc>,
        status: ReportStatus,
        diff: &[Discrepancy],
    ) -> Result<ReconReport, ReconcilerError> {
        let mut reports = self.reports.lock().unwrap();
        let mut audit = self.audit.lock().unwrap();
        let report = ReconReport {
            id: reports.len() as i32 + 1,
            run_at,
            status,
            diff: serde_json::to_value(diff).unwrap(),
        };
        reports.push(report.clone());
        for d in diff {
            let id = audit.len() as i32 + 1;
            audit.push(AuditEvent {
                id,
                event_type: RECON_DIFF_EVENT.to_owned(),
                payload: Some(serde_json::to_value(d).unwrap()),
                created_at: run_at,
            });
        }
        Ok(report)
    }

    async fn list_reports(&self, page: PageRequest) -> Result<Vec<ReconReport>, ReconcilerError> {
        let mut rows = self.reports.lock().unwrap().clone();
        rows.sort_by(|a, b| b.run_at.cmp(&a.run_at).then(b.id.cmp(&a.id)));
        Ok(page_of(rows, page))
    }

    async fn list_audit_events(
        &self,
        event_type: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<AuditEvent>, ReconcilerError> {
        let mut rows: Vec<_> = self
            .audit
            .lock()
            .unwrap()
            .iter()
            .filter(|e| event_type.is_none_or(|t| e.event_type == t))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page_of(rows, page))
    }
}

// ── Builders ─────────────────────────────────────────────────────────────────

pub fn run_usecase(
    assets: MockAssetSource,
    reports: MockReportRepo,
    default_path: PathBuf,
) -> RunReconciliationUseCase<MockAssetSource, FsExpectedListReader, MockReportRepo> {
    RunReconciliationUseCase {
        assets,
        files: FsExpectedListReader,
        reports,
        default_path,
    }
}

/// A default path that never exists.
pub fn no_default_file() -> PathBuf {
    std::env::temp_dir().join(format!("stockroom-absent-{}.csv", std::process::id()))
}
