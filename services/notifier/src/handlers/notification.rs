use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockroom_domain::pagination::PageRequest;

use crate::domain::types::NotificationRecord;
use crate::error::NotifierError;
use crate::metrics::MetricsSnapshot;
use crate::state::AppState;
use crate::usecase::list::ListNotificationsUseCase;

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub message_id: Uuid,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub channel: &'static str,
    pub recipient: String,
    pub subject: Option<String>,
    pub message: String,
    pub status: &'static str,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    #[serde(serialize_with = "stockroom_core::serde::opt_to_rfc3339_ms")]
    pub next_attempt_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(serialize_with = "stockroom_core::serde::opt_to_rfc3339_ms")]
    pub sent_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(serialize_with = "stockroom_core::serde::to_rfc3339_ms")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(serialize_with = "stockroom_core::serde::to_rfc3339_ms")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<NotificationRecord> for NotificationResponse {
    fn from(record: NotificationRecord) -> Self {
        Self {
            message_id: record.message_id.0,
            kind: record.kind.as_str(),
            channel: record.severity.as_str(),
            recipient: record.recipient,
            subject: record.subject,
            message: record.message,
            status: record.status.as_str(),
            attempts: record.attempts,
            max_attempts: record.max_attempts,
            last_error: record.last_error,
            next_attempt_at: record.next_attempt_at,
            sent_at: record.sent_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

// ── Query params ─────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct NotificationListQuery {
    pub per_page: Option<u32>,
    pub page: Option<u32>,
    pub status: Option<String>,
}

// ── GET /admin/notifications ─────────────────────────────────────────────────

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Vec<NotificationResponse>>, NotifierError> {
    let defaults = PageRequest::default();
    let page = PageRequest {
        per_page: query.per_page.unwrap_or(defaults.per_page),
        page: query.page.unwrap_or(defaults.page),
    };
    let usecase = ListNotificationsUseCase {
        repo: state.notification_repo(),
    };
    let records = usecase.execute(query.status.as_deref(), page).await?;
    Ok(Json(records.into_iter().map(NotificationResponse::from).collect()))
}

// ── GET /admin/metrics ───────────────────────────────────────────────────────

pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

// ── GET /readyz ──────────────────────────────────────────────────────────────

pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    stockroom_core::health::database_ready(&state.db).await
}
