use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use stockroom_domain::pagination::PageRequest;

use crate::domain::types::{AuditEvent, ExpectedItem, ReconReport, ReconciliationRun};
use crate::error::ReconcilerError;
use crate::state::AppState;
use crate::usecase::list::{ListAuditEventsUseCase, ListReconReportsUseCase};
use crate::usecase::run::ExpectedSource;

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconReportResponse {
    pub id: i32,
    #[serde(serialize_with = "stockroom_core::serde::to_rfc3339_ms")]
    pub run_at: chrono::DateTime<chrono::Utc>,
    pub status: &'static str,
    pub diff: Value,
}

impl From<ReconReport> for ReconReportResponse {
    fn from(report: ReconReport) -> Self {
        Self {
            id: report.id,
            run_at: report.run_at,
            status: report.status.as_str(),
            diff: report.diff,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub report: ReconReportResponse,
    pub discrepancies: usize,
}

impl From<ReconciliationRun> for RunResponse {
    fn from(run: ReconciliationRun) -> Self {
        Self {
            discrepancies: run.discrepancies.len(),
            report: run.report.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEventResponse {
    pub id: i32,
    pub event_type: String,
    pub payload: Option<Value>,
    #[serde(serialize_with = "stockroom_core::serde::to_rfc3339_ms")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<AuditEvent> for AuditEventResponse {
    fn from(event: AuditEvent) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type,
            payload: event.payload,
            created_at: event.created_at,
        }
    }
}

// ── Request / query params ───────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct RunRequest {
    pub expected: Option<Vec<ExpectedItem>>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct PageQuery {
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

impl PageQuery {
    fn page_request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest {
            per_page: self.per_page.unwrap_or(defaults.per_page),
            page: self.page.unwrap_or(defaults.page),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct AuditEventQuery {
    pub per_page: Option<u32>,
    pub page: Option<u32>,
    pub event_type: Option<String>,
}

// ── POST /admin/reconciliation/run ───────────────────────────────────────────

/// An absent body or `expected` field runs against the configured default file.
pub async fn run_reconciliation(
    State(state): State<AppState>,
    body: Option<Json<RunRequest>>,
) -> Result<Json<RunResponse>, ReconcilerError> {
    let source = match body.and_then(|Json(body)| body.expected) {
        Some(items) => ExpectedSource::Inline(items),
        None => ExpectedSource::Default,
    };
    let run = state.run_usecase().execute(source).await?;
    Ok(Json(run.into()))
}

// ── GET /admin/recon-reports ─────────────────────────────────────────────────

pub async fn list_recon_reports(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ReconReportResponse>>, ReconcilerError> {
    let usecase = ListReconReportsUseCase {
        repo: state.report_repo(),
    };
    let reports = usecase.execute(query.page_request()).await?;
    Ok(Json(reports.into_iter().map(Into::into).collect()))
}

// ── GET /admin/audit-events ──────────────────────────────────────────────────

pub async fn list_audit_events(
    State(state): State<AppState>,
    Query(query): Query<AuditEventQuery>,
) -> Result<Json<Vec<AuditEventResponse>>, ReconcilerError> {
    let page = PageQuery {
        per_page: query.per_page,
        page: query.page,
    }
    .page_request();
    let usecase = ListAuditEventsUseCase {
        repo: state.report_repo(),
    };
    let events = usecase.execute(query.event_type.as_deref(), page).await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

// ── GET /readyz ──────────────────────────────────────────────────────────────

pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    stockroom_core::health::database_ready(&state.db).await
}
