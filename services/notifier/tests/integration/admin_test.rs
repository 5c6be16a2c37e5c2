use std::sync::Arc;

use axum_test::TestServer;
use sea_orm::DatabaseConnection;

use stockroom_domain::pagination::PageRequest;
use stockroom_notifier::domain::types::{DeliveryKind, NotificationStatus};
use stockroom_notifier::error::NotifierError;
use stockroom_notifier::metrics::Metrics;
use stockroom_notifier::router::build_router;
use stockroom_notifier::state::AppState;
use stockroom_notifier::usecase::list::ListNotificationsUseCase;

use crate::helpers::{MockNotificationRepo, pending_record, retry_record};

fn server(metrics: Arc<Metrics>) -> TestServer {
    let state = AppState {
        db: DatabaseConnection::Disconnected,
        metrics,
    };
    TestServer::new(build_router(state)).unwrap()
}

#[tokio::test]
async fn should_reject_unknown_status_filter() {
    let uc = ListNotificationsUseCase {
        repo: MockNotificationRepo::empty(),
    };

    let result = uc.execute(Some("queued"), PageRequest::default()).await;

    assert!(
        matches!(result, Err(NotifierError::InvalidStatus(ref s)) if s == "queued"),
        "expected InvalidStatus, got {result:?}"
    );
}

#[tokio::test]
async fn should_filter_by_status_most_recent_first() {
    let older = retry_record(1, 3, chrono::Utc::now());
    let mut newer = retry_record(1, 3, chrono::Utc::now());
    newer.created_at = older.created_at + chrono::TimeDelta::seconds(1);
    let pending = pending_record(DeliveryKind::Internal, 3);
    let uc = ListNotificationsUseCase {
        repo: MockNotificationRepo::new(vec![older.clone(), pending, newer.clone()]),
    };

    let listed = uc.execute(Some("retry"), PageRequest::default()).await.unwrap();

    let ids: Vec<_> = listed.iter().map(|r| r.message_id).collect();
    assert_eq!(ids, vec![newer.message_id, older.message_id]);
    assert!(listed.iter().all(|r| r.status == NotificationStatus::Retry));
}

#[tokio::test]
async fn should_treat_blank_status_as_no_filter() {
    let uc = ListNotificationsUseCase {
        repo: MockNotificationRepo::new(vec![
            pending_record(DeliveryKind::Internal, 3),
            retry_record(1, 3, chrono::Utc::now()),
        ]),
    };

    let listed = uc.execute(Some(" "), PageRequest::default()).await.unwrap();

    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn should_clamp_page_size() {
    let records = (0..3)
        .map(|_| pending_record(DeliveryKind::Internal, 3))
        .collect();
    let uc = ListNotificationsUseCase {
        repo: MockNotificationRepo::new(records),
    };

    let page = PageRequest {
        per_page: 0,
        page: 0,
    };
    let listed = uc.execute(None, page).await.unwrap();

    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn should_answer_liveness_and_report_unready_database() {
    let server = server(Arc::new(Metrics::new()));

    server.get("/healthz").await.assert_status_ok();
    server
        .get("/readyz")
        .await
        .assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn should_return_request_id_header() {
    let server = server(Arc::new(Metrics::new()));

    let response = server.get("/healthz").await;

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn should_return_400_for_invalid_status_query() {
    let server = server(Arc::new(Metrics::new()));

    let response = server.get("/admin/notifications?status=queued").await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "INVALID_STATUS");
}

#[tokio::test]
async fn should_hide_store_failures_behind_internal_error() {
    let server = server(Arc::new(Metrics::new()));

    let response = server.get("/admin/notifications?per-page=5").await;

    response.assert_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "INTERNAL");
    assert_eq!(body["message"], "internal error");
}

#[tokio::test]
async fn should_serve_metrics_snapshot() {
    let metrics = Arc::new(Metrics::new());
    metrics.record_processed("asset_created");
    metrics.record_sent("internal");
    let server = server(metrics);

    let response = server.get("/admin/metrics").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["processed"], 1);
    assert_eq!(body["sent"], 1);
    assert_eq!(body["byType"]["asset_created"], 1);
    assert_eq!(body["byKind"]["internal"], 1);
}
