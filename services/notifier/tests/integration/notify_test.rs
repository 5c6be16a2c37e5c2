use std::sync::Arc;

use stockroom_domain::event::{AssetAction, DomainEvent, Severity};
use stockroom_notifier::domain::template::TemplateRegistry;
use stockroom_notifier::domain::types::{DeliveryKind, NotificationStatus};
use stockroom_notifier::error::NotifierError;
use stockroom_notifier::infra::channels::ChannelRegistry;
use stockroom_notifier::usecase::deliver::DeliveryOutcome;
use stockroom_testing::events;

use crate::helpers::{MockDelivery, MockNotificationRepo, notify};

#[tokio::test]
async fn should_send_asset_created_notification_over_internal_channel() {
    let repo = MockNotificationRepo::empty();
    let uc = notify(repo.clone(), ChannelRegistry::internal_only());

    let event = events::asset_event(
        AssetAction::Created,
        events::asset("E123456-2024", "Drill"),
    );
    let dispatched = uc.execute(DomainEvent::Asset(event)).await.unwrap();

    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].outcome, DeliveryOutcome::Sent);

    let record = repo.get(dispatched[0].message_id);
    assert_eq!(record.kind, DeliveryKind::Internal);
    assert_eq!(record.severity, Severity::Success);
    assert_eq!(record.status, NotificationStatus::Sent);
    assert_eq!(record.attempts, 1);
    assert!(record.sent_at.is_some());
    assert_eq!(record.recipient, "admin@inventory.local");
    assert_eq!(record.subject.as_deref(), Some("New asset created"));
    assert_eq!(
        record.message,
        "Asset created: Drill (E123456-2024) in category tools"
    );
    assert_eq!(record.template_data.unwrap()["assetId"], "E123456-2024");
}

#[tokio::test]
async fn should_pass_through_pending_before_sent() {
    let repo = MockNotificationRepo::empty();
    let uc = notify(repo.clone(), MockDelivery::ok());

    let event = events::asset_event(AssetAction::Updated, events::asset("A1", "Ladder"));
    uc.handle_asset_event(&event).await.unwrap();

    let writes = repo.writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 1, "one status write after the pending insert");
    assert_eq!(writes[0].1, NotificationStatus::Sent);
    assert_eq!(writes[0].2, 1);
}

#[tokio::test]
async fn should_bucket_deleted_assets_as_warning() {
    let repo = MockNotificationRepo::empty();
    let uc = notify(repo.clone(), MockDelivery::ok());

    let event = events::asset_event(AssetAction::Deleted, events::asset("A1", "Ladder"));
    uc.handle_asset_event(&event).await.unwrap();

    assert_eq!(repo.all()[0].severity, Severity::Warning);
}

#[tokio::test]
async fn should_prefer_explicit_event_severity() {
    let repo = MockNotificationRepo::empty();
    let uc = notify(repo.clone(), MockDelivery::ok());

    let mut event = events::asset_event(AssetAction::Created, events::asset("A1", "Ladder"));
    event.severity = Some(Severity::Error);
    uc.handle_asset_event(&event).await.unwrap();

    assert_eq!(repo.all()[0].severity, Severity::Error);
}

#[tokio::test]
async fn should_render_missing_fields_as_empty() {
    let repo = MockNotificationRepo::empty();
    let uc = notify(repo.clone(), MockDelivery::ok());

    let mut snapshot = events::asset("A1", "Ladder");
    snapshot.category = None;
    let event = events::asset_event(AssetAction::Created, snapshot);
    uc.handle_asset_event(&event).await.unwrap();

    let record = &repo.all()[0];
    assert_eq!(record.message, "Asset created: Ladder (A1) in category ");
    assert!(!record.message.contains("{{"));
}

#[tokio::test]
async fn should_raise_low_stock_alert_alongside_standard_notification() {
    let repo = MockNotificationRepo::empty();
    let uc = notify(repo.clone(), ChannelRegistry::internal_only());

    let event = events::warehouse_event(events::warehouse(95, 100));
    let dispatched = uc.handle_warehouse_event(&event).await.unwrap();
    assert_eq!(dispatched.len(), 2);

    let records = repo.all();
    let alerts: Vec<_> = records
        .iter()
        .filter(|r| r.kind == DeliveryKind::Email)
        .collect();
    assert_eq!(alerts.len(), 1, "exactly one low-stock alert");
    let alert = alerts[0];
    assert_eq!(alert.max_attempts, 5);
    assert_eq!(alert.severity, Severity::Warning);
    assert_eq!(alert.recipient, "admin@inventory.local");
    assert_eq!(alert.subject.as_deref(), Some("Warehouse capacity warning"));
    assert!(alert.message.contains("<h2>"), "alert uses the HTML body");
    assert!(alert.message.contains("95.0%"));
    assert!(alert.message.contains("Main Warehouse"));
    // No e-mail relay is configured, so the first attempt fails into retry.
    assert_eq!(alert.status, NotificationStatus::Retry);
    assert_eq!(alert.attempts, 1);
    assert_eq!(alert.last_error.as_deref(), Some("channel email is disabled"));

    let standard = records
        .iter()
        .find(|r| r.kind == DeliveryKind::Internal)
        .unwrap();
    assert_eq!(standard.status, NotificationStatus::Sent);
    assert_eq!(standard.severity, Severity::Info);
    assert_eq!(standard.recipient, "warehouse@inventory.local");
    assert_eq!(
        standard.message,
        "Warehouse Main Warehouse was updated. Utilization: 95.0%"
    );
}

#[tokio::test]
async fn should_not_alert_at_threshold() {
    let repo = MockNotificationRepo::empty();
    let uc = notify(repo.clone(), MockDelivery::ok());

    let event = events::warehouse_event(events::warehouse(90, 100));
    uc.handle_warehouse_event(&event).await.unwrap();

    let records = repo.all();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, DeliveryKind::Internal);
}

#[tokio::test]
async fn should_drop_events_without_template() {
    let repo = MockNotificationRepo::empty();
    let mut uc = notify(repo.clone(), MockDelivery::ok());
    uc.templates = Arc::new(TemplateRegistry::empty());

    let event = events::asset_event(AssetAction::Created, events::asset("A1", "Ladder"));
    let dispatched = uc.handle_asset_event(&event).await.unwrap();

    assert!(dispatched.is_empty());
    assert!(repo.all().is_empty());
    let metrics = uc.deliver.metrics.snapshot();
    assert_eq!(metrics.processed, 1);
    assert_eq!(metrics.by_type["asset_created"], 1);
}

#[tokio::test]
async fn should_store_direct_request_verbatim() {
    let repo = MockNotificationRepo::empty();
    let uc = notify(repo.clone(), MockDelivery::ok());

    let request = events::notification_request(
        Severity::Warning,
        "Stock check",
        "Level is {{level}} today",
    );
    let dispatched = uc.handle_notification_request(&request).await.unwrap();

    let record = repo.get(dispatched.message_id);
    assert_eq!(record.kind, DeliveryKind::Internal);
    assert_eq!(record.severity, Severity::Warning);
    assert_eq!(record.recipient, "system");
    assert_eq!(record.subject.as_deref(), Some("Stock check"));
    assert_eq!(record.message, "Level is {{level}} today");
    assert_eq!(record.template_data.unwrap()["type"], "warning");
}

#[tokio::test]
async fn should_address_direct_request_to_user() {
    let repo = MockNotificationRepo::empty();
    let uc = notify(repo.clone(), MockDelivery::ok());

    let mut request = events::notification_request(Severity::Info, "Hi", "Hello");
    request.user_id = Some("17".to_owned());
    uc.handle_notification_request(&request).await.unwrap();

    assert_eq!(repo.all()[0].recipient, "17");
}

#[tokio::test]
async fn should_count_metrics_per_type_and_kind() {
    let repo = MockNotificationRepo::empty();
    let uc = notify(repo, ChannelRegistry::internal_only());

    uc.execute(DomainEvent::Asset(events::asset_event(
        AssetAction::Created,
        events::asset("A1", "Ladder"),
    )))
    .await
    .unwrap();
    uc.execute(DomainEvent::Warehouse(events::warehouse_event(
        events::warehouse(99, 100),
    )))
    .await
    .unwrap();

    let metrics = uc.deliver.metrics.snapshot();
    assert_eq!(metrics.processed, 2);
    assert_eq!(metrics.sent, 2);
    assert_eq!(metrics.retried, 1);
    assert_eq!(metrics.by_kind["internal"], 2);
    assert_eq!(metrics.by_type["warehouse_updated"], 1);
}

#[tokio::test]
async fn should_surface_store_error_without_sending() {
    let repo = MockNotificationRepo::empty();
    let uc = notify(repo.clone(), MockDelivery::ok());
    repo.set_fail_writes(true);
    let request = events::notification_request(Severity::Info, "Ping", "Ping");

    let result = uc.handle_notification_request(&request).await;

    assert!(
        matches!(result, Err(NotifierError::Internal(_))),
        "expected Internal, got {result:?}"
    );
    assert_eq!(uc.deliver.channels.calls(), 0);
    assert!(repo.all().is_empty());
}
