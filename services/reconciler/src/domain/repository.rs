#![allow(async_fn_in_trait)]

use std::path::Path;

use chrono::{DateTime, Utc};

use stockroom_domain::asset::AssetSnapshot;
use stockroom_domain::pagination::PageRequest;

use crate::domain::types::{AuditEvent, Discrepancy, ExpectedItem, ReconReport, ReportStatus};
use crate::error::ReconcilerError;

/// Read-only view of the live asset store.
pub trait AssetSource: Send + Sync {
    async fn list_assets(&self) -> Result<Vec<AssetSnapshot>, ReconcilerError>;
}

/// Reconciliation reports and their audit trail. Append-only.
pub trait ReportRepository: Send + Sync {
    /// Write the report and one `recon_diff` audit event per discrepancy, all or nothing.
    async fn record_run(
        &self,
        run_at: DateTime<Utc>,
        status: ReportStatus,
        diff: &[Discrepancy],
    ) -> Result<ReconReport, ReconcilerError>;

    /// Most recent run first.
    async fn list_reports(&self, page: PageRequest) -> Result<Vec<ReconReport>, ReconcilerError>;

    /// Most recent first, optionally restricted to one event type.
    async fn list_audit_events(
        &self,
        event_type: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<AuditEvent>, ReconcilerError>;
}

/// Loads an expected-inventory file.
pub trait ExpectedListReader: Send + Sync {
    /// `Ok(None)` when nothing exists at `path`.
    async fn read(&self, path: &Path) -> Result<Option<Vec<ExpectedItem>>, ReconcilerError>;
}
