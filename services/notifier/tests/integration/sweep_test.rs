use chrono::{TimeDelta, Utc};

use stockroom_notifier::domain::types::{DeliveryKind, NotificationStatus};
use stockroom_notifier::error::NotifierError;
use stockroom_notifier::usecase::sweep::{CleanupUseCase, RetrySweepUseCase, SweepReport};

use crate::helpers::{
    MockDelivery, MockNotificationRepo, deliver, pending_record, retry_record, sent_record,
};

#[tokio::test]
async fn should_retry_only_due_records() {
    let now = Utc::now();
    let due = retry_record(1, 3, now - TimeDelta::seconds(5));
    let later = retry_record(1, 3, now + TimeDelta::minutes(10));
    let repo = MockNotificationRepo::new(vec![due.clone(), later.clone()]);
    let sweep = RetrySweepUseCase {
        deliver: deliver(repo.clone(), MockDelivery::ok()),
        batch_size: 10,
        pending_grace: TimeDelta::minutes(2),
    };

    let report = sweep.execute(now).await.unwrap();

    assert_eq!(
        report,
        SweepReport {
            picked: 1,
            sent: 1,
            ..Default::default()
        }
    );
    let sent = repo.get(due.message_id);
    assert_eq!(sent.status, NotificationStatus::Sent);
    assert_eq!(sent.attempts, 2);
    assert_eq!(repo.get(later.message_id), later);
}

#[tokio::test]
async fn should_fail_exhausted_retry_records_without_sending() {
    let now = Utc::now();
    let exhausted = retry_record(3, 3, now + TimeDelta::hours(1));
    let repo = MockNotificationRepo::new(vec![exhausted.clone()]);
    let sweep = RetrySweepUseCase {
        deliver: deliver(repo.clone(), MockDelivery::ok()),
        batch_size: 10,
        pending_grace: TimeDelta::minutes(2),
    };

    let report = sweep.execute(now).await.unwrap();

    assert_eq!(report.exhausted, 1);
    assert_eq!(sweep.deliver.channels.calls(), 0);
    let record = repo.get(exhausted.message_id);
    assert_eq!(record.status, NotificationStatus::Failed);
    assert_eq!(record.attempts, 3);
    assert_eq!(record.last_error, exhausted.last_error);
}

#[tokio::test]
async fn should_bound_sweep_to_batch_size() {
    let now = Utc::now();
    let records: Vec<_> = (0..5)
        .map(|i| retry_record(1, 3, now - TimeDelta::seconds(60 - i)))
        .collect();
    let oldest = records[0].message_id;
    let repo = MockNotificationRepo::new(records);
    let sweep = RetrySweepUseCase {
        deliver: deliver(repo.clone(), MockDelivery::ok()),
        batch_size: 2,
        pending_grace: TimeDelta::minutes(2),
    };

    let report = sweep.execute(now).await.unwrap();

    assert_eq!(report.picked, 2);
    assert_eq!(repo.get(oldest).status, NotificationStatus::Sent);
    let still_retry = repo
        .all()
        .iter()
        .filter(|r| r.status == NotificationStatus::Retry)
        .count();
    assert_eq!(still_retry, 3);
}

#[tokio::test]
async fn should_reschedule_failed_retry_with_longer_backoff() {
    let now = Utc::now();
    let due = retry_record(1, 3, now - TimeDelta::seconds(1));
    let repo = MockNotificationRepo::new(vec![due.clone()]);
    let sweep = RetrySweepUseCase {
        deliver: deliver(repo.clone(), MockDelivery::always_failing()),
        batch_size: 10,
        pending_grace: TimeDelta::minutes(2),
    };

    let report = sweep.execute(now).await.unwrap();

    assert_eq!(report.retried, 1);
    let record = repo.get(due.message_id);
    assert_eq!(record.status, NotificationStatus::Retry);
    assert_eq!(record.attempts, 2);
    let next = record.next_attempt_at.unwrap();
    assert!(next >= now + TimeDelta::seconds(60), "second retry waits 2x base");
}

#[tokio::test]
async fn should_pick_up_pending_records_older_than_grace() {
    let now = Utc::now();
    let mut stranded = pending_record(DeliveryKind::Webhook, 3);
    stranded.created_at = now - TimeDelta::minutes(10);
    stranded.updated_at = stranded.created_at;
    let in_flight = pending_record(DeliveryKind::Webhook, 3);
    let repo = MockNotificationRepo::new(vec![stranded.clone(), in_flight.clone()]);
    let sweep = RetrySweepUseCase {
        deliver: deliver(repo.clone(), MockDelivery::ok()),
        batch_size: 10,
        pending_grace: TimeDelta::minutes(2),
    };

    let report = sweep.execute(now).await.unwrap();

    assert_eq!(
        report,
        SweepReport {
            picked: 1,
            sent: 1,
            ..Default::default()
        }
    );
    let recovered = repo.get(stranded.message_id);
    assert_eq!(recovered.status, NotificationStatus::Sent);
    assert_eq!(recovered.attempts, 1);
    assert_eq!(repo.get(in_flight.message_id), in_flight);
}

#[tokio::test]
async fn should_count_store_errors_and_finish_the_batch() {
    let now = Utc::now();
    let first = retry_record(1, 3, now - TimeDelta::seconds(10));
    let second = retry_record(1, 3, now - TimeDelta::seconds(5));
    let repo = MockNotificationRepo::new(vec![first.clone(), second.clone()]);
    let sweep = RetrySweepUseCase {
        deliver: deliver(repo.clone(), MockDelivery::ok()),
        batch_size: 10,
        pending_grace: TimeDelta::minutes(2),
    };
    repo.set_fail_writes(true);

    let report = sweep.execute(now).await.unwrap();

    assert_eq!(
        report,
        SweepReport {
            picked: 2,
            errors: 2,
            ..Default::default()
        }
    );
    assert_eq!(sweep.deliver.channels.calls(), 2);
    assert_eq!(repo.get(first.message_id), first);
    assert_eq!(repo.get(second.message_id), second);

    repo.set_fail_writes(false);
    let report = sweep.execute(now).await.unwrap();
    assert_eq!(report.sent, 2);
}

#[tokio::test]
async fn should_fail_sweep_when_batch_cannot_be_read() {
    let now = Utc::now();
    let repo = MockNotificationRepo::new(vec![retry_record(1, 3, now)]);
    let sweep = RetrySweepUseCase {
        deliver: deliver(repo.clone(), MockDelivery::ok()),
        batch_size: 10,
        pending_grace: TimeDelta::minutes(2),
    };
    repo.set_fail_reads(true);

    let result = sweep.execute(now).await;

    assert!(
        matches!(result, Err(NotifierError::Internal(_))),
        "expected Internal, got {result:?}"
    );
    assert_eq!(sweep.deliver.channels.calls(), 0);
}

#[tokio::test]
async fn should_remove_only_old_sent_records() {
    let old_sent = sent_record(TimeDelta::days(31));
    let recent_sent = sent_record(TimeDelta::days(2));
    let mut old_failed = sent_record(TimeDelta::days(40));
    old_failed.status = NotificationStatus::Failed;
    old_failed.sent_at = None;
    let repo = MockNotificationRepo::new(vec![
        old_sent.clone(),
        recent_sent.clone(),
        old_failed.clone(),
    ]);
    let cleanup = CleanupUseCase {
        repo: repo.clone(),
        retention: TimeDelta::days(30),
        batch_size: 100,
    };

    let removed = cleanup.execute(Utc::now()).await.unwrap();

    assert_eq!(removed, 1);
    let remaining: Vec<_> = repo.all().into_iter().map(|r| r.message_id).collect();
    assert_eq!(remaining, vec![recent_sent.message_id, old_failed.message_id]);
}

#[tokio::test]
async fn should_bound_cleanup_to_batch_size() {
    let records: Vec<_> = (0..4).map(|_| sent_record(TimeDelta::days(60))).collect();
    let repo = MockNotificationRepo::new(records);
    let cleanup = CleanupUseCase {
        repo: repo.clone(),
        retention: TimeDelta::days(30),
        batch_size: 3,
    };

    assert_eq!(cleanup.execute(Utc::now()).await.unwrap(), 3);
    assert_eq!(cleanup.execute(Utc::now()).await.unwrap(), 1);
    assert_eq!(cleanup.execute(Utc::now()).await.unwrap(), 0);
}
