use stockroom_domain::pagination::PageRequest;

use crate::domain::repository::ReportRepository;
use crate::domain::types::{AuditEvent, ReconReport};
use crate::error::ReconcilerError;

pub struct ListReconReportsUseCase<R: ReportRepository> {
    pub repo: R,
}

impl<R: ReportRepository> ListReconReportsUseCase<R> {
    pub async fn execute(&self, page: PageRequest) -> Result<Vec<ReconReport>, ReconcilerError> {
        self.repo.list_reports(page.clamped()).await
    }
}

pub struct ListAuditEventsUseCase<R: ReportRepository> {
    pub repo: R,
}

impl<R: ReportRepository> ListAuditEventsUseCase<R> {
    /// A blank `event_type` means no filter.
    pub async fn execute(
        &self,
        event_type: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<AuditEvent>, ReconcilerError> {
        let event_type = event_type.map(str::trim).filter(|s| !s.is_empty());
        self.repo.list_audit_events(event_type, page.clamped()).await
    }
}
