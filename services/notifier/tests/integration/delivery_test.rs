use chrono::{TimeDelta, Utc};

use stockroom_domain::event::Severity;
use stockroom_notifier::domain::types::{DeliveryKind, NotificationStatus};
use stockroom_notifier::error::NotifierError;
use stockroom_notifier::usecase::deliver::DeliveryOutcome;
use stockroom_notifier::usecase::sweep::RetrySweepUseCase;
use stockroom_testing::events;

use crate::helpers::{MockDelivery, MockNotificationRepo, deliver, notify, pending_record};

#[tokio::test]
async fn should_fail_after_max_attempts_with_always_failing_sender() {
    let repo = MockNotificationRepo::empty();
    let record = pending_record(DeliveryKind::Webhook, 3);
    let message_id = record.message_id;
    repo.records.lock().unwrap().push(record);
    let uc = deliver(repo.clone(), MockDelivery::always_failing());

    let first = uc.execute(&repo.get(message_id)).await.unwrap();
    assert_eq!(first, DeliveryOutcome::Retry);
    let second = uc.execute(&repo.get(message_id)).await.unwrap();
    assert_eq!(second, DeliveryOutcome::Retry);
    let third = uc.execute(&repo.get(message_id)).await.unwrap();
    assert_eq!(third, DeliveryOutcome::Failed);

    let record = repo.get(message_id);
    assert_eq!(record.status, NotificationStatus::Failed);
    assert_eq!(record.attempts, 3);
    assert_eq!(
        record.last_error.as_deref(),
        Some("provider error: 503 relay unavailable")
    );
    assert!(record.next_attempt_at.is_none());
    assert_eq!(uc.channels.calls(), 3);
}

#[tokio::test]
async fn should_reach_failed_through_retry_sweeps() {
    let repo = MockNotificationRepo::empty();
    let uc = notify(repo.clone(), MockDelivery::always_failing());
    let request = events::notification_request(Severity::Error, "Sync", "Sync failed");
    let dispatched = uc.handle_notification_request(&request).await.unwrap();
    assert_eq!(dispatched.outcome, DeliveryOutcome::Retry);

    let sweep = RetrySweepUseCase {
        deliver: uc.deliver,
        batch_size: 10,
        pending_grace: TimeDelta::minutes(2),
    };
    let far_future = Utc::now() + TimeDelta::days(2);
    for _ in 0..5 {
        sweep.execute(far_future).await.unwrap();
    }

    let record = repo.get(dispatched.message_id);
    assert_eq!(record.status, NotificationStatus::Failed);
    assert_eq!(record.attempts, 3);
    assert_eq!(sweep.deliver.channels.calls(), 3);
}

#[tokio::test]
async fn should_never_change_terminal_records() {
    let repo = MockNotificationRepo::empty();
    let record = pending_record(DeliveryKind::Internal, 3);
    let message_id = record.message_id;
    repo.records.lock().unwrap().push(record);
    let uc = deliver(repo.clone(), MockDelivery::ok());

    assert_eq!(
        uc.execute(&repo.get(message_id)).await.unwrap(),
        DeliveryOutcome::Sent
    );
    let sent = repo.get(message_id);
    assert_eq!(uc.execute(&sent).await.unwrap(), DeliveryOutcome::Skipped);

    let after = repo.get(message_id);
    assert_eq!(after, sent);
    assert_eq!(uc.channels.calls(), 1);
}

#[tokio::test]
async fn should_drop_write_from_stale_copy() {
    let repo = MockNotificationRepo::empty();
    let record = pending_record(DeliveryKind::Internal, 3);
    let stale = record.clone();
    repo.records.lock().unwrap().push(record);
    let uc = deliver(repo.clone(), MockDelivery::ok());

    assert_eq!(uc.execute(&stale).await.unwrap(), DeliveryOutcome::Sent);
    assert_eq!(uc.execute(&stale).await.unwrap(), DeliveryOutcome::LostRace);

    let stored = repo.get(stale.message_id);
    assert_eq!(stored.status, NotificationStatus::Sent);
    assert_eq!(stored.attempts, 1);
}

#[tokio::test]
async fn should_keep_attempts_monotonic_and_bounded() {
    let repo = MockNotificationRepo::empty();
    let mut uc = notify(repo.clone(), MockDelivery::failing(3));
    uc.settings.default_max_attempts = 5;
    let request = events::notification_request(Severity::Info, "Ping", "Ping");
    let dispatched = uc.handle_notification_request(&request).await.unwrap();

    let sweep = RetrySweepUseCase {
        deliver: uc.deliver,
        batch_size: 10,
        pending_grace: TimeDelta::minutes(2),
    };
    let far_future = Utc::now() + TimeDelta::days(2);
    for _ in 0..6 {
        sweep.execute(far_future).await.unwrap();
    }

    let writes: Vec<_> = repo
        .writes
        .lock()
        .unwrap()
        .iter()
        .filter(|(id, ..)| *id == dispatched.message_id)
        .map(|(_, status, attempts)| (*status, *attempts))
        .collect();
    assert_eq!(
        writes,
        vec![
            (NotificationStatus::Retry, 1),
            (NotificationStatus::Retry, 2),
            (NotificationStatus::Retry, 3),
            (NotificationStatus::Sent, 4),
        ]
    );
    assert!(writes.iter().all(|(_, attempts)| *attempts <= 5));
}

#[tokio::test]
async fn should_leave_record_pending_when_status_write_fails() {
    let repo = MockNotificationRepo::empty();
    let record = pending_record(DeliveryKind::Webhook, 3);
    let message_id = record.message_id;
    repo.records.lock().unwrap().push(record.clone());
    let uc = deliver(repo.clone(), MockDelivery::ok());
    repo.set_fail_writes(true);

    let result = uc.execute(&record).await;

    assert!(
        matches!(result, Err(NotifierError::Internal(_))),
        "expected Internal, got {result:?}"
    );
    assert_eq!(uc.channels.calls(), 1);
    assert_eq!(repo.get(message_id), record);
    assert!(repo.writes.lock().unwrap().is_empty());

    repo.set_fail_writes(false);
    let sweep = RetrySweepUseCase {
        deliver: uc,
        batch_size: 10,
        pending_grace: TimeDelta::minutes(2),
    };
    let report = sweep
        .execute(Utc::now() + TimeDelta::minutes(5))
        .await
        .unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(repo.get(message_id).status, NotificationStatus::Sent);
}
