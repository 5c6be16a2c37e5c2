use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;

use stockroom_broker::client::BrokerClient;
use stockroom_broker::memory::{MemoryBroker, MemoryTransport};
use stockroom_broker::publisher::EventPublisher;
use stockroom_broker::topology::declare_topology;
use stockroom_domain::event::{AssetAction, INVENTORY_EXCHANGE, Severity, WarehouseAction};
use stockroom_notifier::domain::template::TemplateRegistry;
use stockroom_notifier::domain::types::{DeliveryKind, NotificationStatus};
use stockroom_notifier::infra::channels::ChannelRegistry;
use stockroom_notifier::metrics::Metrics;
use stockroom_notifier::usecase::deliver::DeliverUseCase;
use stockroom_notifier::usecase::notify::{NotifySettings, NotifyUseCase};
use stockroom_notifier::usecase::sweep::{CleanupUseCase, RetrySweepUseCase};
use stockroom_notifier::worker::{Worker, WorkerHandle, WorkerSettings};
use stockroom_testing::events;

use crate::helpers::MockNotificationRepo;

struct Running {
    memory: MemoryBroker,
    broker: Arc<BrokerClient<MemoryTransport>>,
    repo: MockNotificationRepo,
    metrics: Arc<Metrics>,
    shutdown: watch::Sender<bool>,
    handle: WorkerHandle,
}

impl Running {
    fn publisher(&self) -> EventPublisher<MemoryTransport> {
        EventPublisher::new(Arc::clone(&self.broker))
    }

    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        self.handle.join().await;
        self.broker.close().await;
    }
}

/// Worker over an in-process broker with only the internal channel and a zero retry backoff.
async fn start() -> Running {
    let memory = MemoryBroker::new();
    let broker = Arc::new(BrokerClient::new(memory.transport()));
    declare_topology(&broker).await.unwrap();

    let repo = MockNotificationRepo::empty();
    let metrics = Arc::new(Metrics::new());
    let channels = Arc::new(ChannelRegistry::internal_only());
    let deliver = || DeliverUseCase {
        repo: repo.clone(),
        channels: Arc::clone(&channels),
        metrics: Arc::clone(&metrics),
        backoff: Duration::ZERO,
    };

    let worker = Worker {
        broker: Arc::clone(&broker),
        notify: Arc::new(NotifyUseCase {
            deliver: deliver(),
            templates: Arc::new(TemplateRegistry::builtin()),
            settings: NotifySettings::default(),
        }),
        sweep: Arc::new(RetrySweepUseCase {
            deliver: deliver(),
            batch_size: 10,
            pending_grace: chrono::TimeDelta::minutes(2),
        }),
        cleanup: Arc::new(CleanupUseCase {
            repo: repo.clone(),
            retention: chrono::TimeDelta::days(30),
            batch_size: 100,
        }),
        metrics: Arc::clone(&metrics),
        settings: WorkerSettings {
            prefetch: 4,
            handler_timeout: Some(Duration::from_secs(5)),
            retry_interval: Duration::from_millis(20),
            metrics_interval: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(3600),
            resubscribe_delay: Duration::from_millis(20),
        },
    };
    let (shutdown, rx) = watch::channel(false);
    let handle = worker.spawn(rx);

    Running {
        memory,
        broker,
        repo,
        metrics,
        shutdown,
        handle,
    }
}

async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..300 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn should_deliver_published_asset_event_end_to_end() {
    let running = start().await;

    running
        .publisher()
        .publish_asset_event(
            AssetAction::Created,
            "E123456-2024",
            events::asset("E123456-2024", "Drill"),
            None,
        )
        .await
        .unwrap();

    let repo = running.repo.clone();
    eventually(|| {
        repo.all()
            .first()
            .is_some_and(|r| r.status == NotificationStatus::Sent)
    })
    .await;
    let record = &repo.all()[0];
    assert_eq!(record.severity, Severity::Success);
    assert_eq!(record.attempts, 1);
    let memory = running.memory.clone();
    eventually(|| memory.unacked_count("asset.created") == 0).await;
    assert_eq!(running.memory.ready_count("asset.created"), 0);
    assert!(running.memory.dead_letters().is_empty());

    running.stop().await;
}

#[tokio::test]
async fn should_drop_poison_message_and_keep_consuming() {
    let running = start().await;

    running
        .broker
        .publish(INVENTORY_EXCHANGE, "asset.created", &json!({ "bogus": true }))
        .await
        .unwrap();
    let memory = running.memory.clone();
    eventually(|| memory.dead_letters().len() == 1).await;

    running
        .publisher()
        .publish_asset_event(
            AssetAction::Updated,
            "A1",
            events::asset("A1", "Ladder"),
            None,
        )
        .await
        .unwrap();
    let repo = running.repo.clone();
    eventually(|| repo.all().len() == 1).await;
    assert_eq!(running.memory.dead_letters().len(), 1);

    running.stop().await;
}

#[tokio::test]
async fn should_retry_low_stock_alert_until_exhausted() {
    let running = start().await;

    running
        .publisher()
        .publish_warehouse_event(
            WarehouseAction::Updated,
            "1",
            events::warehouse(95, 100),
            None,
        )
        .await
        .unwrap();

    let repo = running.repo.clone();
    eventually(|| {
        repo.all()
            .iter()
            .any(|r| r.kind == DeliveryKind::Email && r.status == NotificationStatus::Failed)
    })
    .await;

    let records = repo.all();
    assert_eq!(records.len(), 2);
    let alert = records
        .iter()
        .find(|r| r.kind == DeliveryKind::Email)
        .unwrap();
    assert_eq!(alert.attempts, 5);
    assert_eq!(alert.last_error.as_deref(), Some("channel email is disabled"));
    let standard = records
        .iter()
        .find(|r| r.kind == DeliveryKind::Internal)
        .unwrap();
    assert_eq!(standard.status, NotificationStatus::Sent);

    let metrics = running.metrics.snapshot();
    assert_eq!(metrics.failed, 1);
    assert_eq!(metrics.retried, 4);

    running.stop().await;
}

#[tokio::test]
async fn should_accept_snapshots_with_decimal_strings() {
    let running = start().await;

    running
        .broker
        .publish(
            INVENTORY_EXCHANGE,
            "warehouse.updated",
            &json!({
                "id": "warehouse-1-1760000000000",
                "action": "updated",
                "warehouseId": "1",
                "warehouseData": {
                    "id": 1,
                    "name": "Main",
                    "maxCapacity": 100,
                    "currentCount": 95,
                    "locationX": "0.00",
                    "locationY": "0.00",
                    "width": "100.00",
                    "height": "100.00",
                },
                "timestamp": "2026-10-18T09:30:00.000Z",
            }),
        )
        .await
        .unwrap();
    running
        .broker
        .publish(
            INVENTORY_EXCHANGE,
            "asset.created",
            &json!({
                "id": "asset-7-1760000000001",
                "action": "created",
                "assetId": "7",
                "assetData": {
                    "id": 7,
                    "assetId": "E123456-2024",
                    "serial": "SN-1",
                    "name": "Drill",
                    "category": "tools",
                    "status": "in_warehouse",
                    "locationX": "12.50",
                    "locationY": "40.00",
                    "inWarehouse": true,
                    "createdAt": "2026-10-18T09:29:59.000Z",
                },
                "timestamp": "2026-10-18T09:30:00.100Z",
            }),
        )
        .await
        .unwrap();

    let repo = running.repo.clone();
    eventually(|| repo.all().len() == 3).await;
    let records = repo.all();
    assert_eq!(
        records
            .iter()
            .filter(|r| r.kind == DeliveryKind::Internal)
            .count(),
        2
    );
    let alert = records
        .iter()
        .find(|r| r.kind == DeliveryKind::Email)
        .unwrap();
    assert_eq!(alert.subject.as_deref(), Some("Warehouse capacity warning"));
    assert!(running.memory.dead_letters().is_empty());

    running.stop().await;
}

#[tokio::test]
async fn should_resubscribe_after_connection_loss() {
    let running = start().await;
    let opened = running.memory.connections_opened();

    running.memory.sever();

    let memory = running.memory.clone();
    eventually(|| memory.connections_opened() > opened).await;
    // Give every supervisor time to attach its new consumer.
    tokio::time::sleep(Duration::from_millis(100)).await;

    running
        .publisher()
        .publish_notification_event(Severity::Info, "Back", "Reconnected", None)
        .await
        .unwrap();
    let repo = running.repo.clone();
    eventually(|| {
        repo.all()
            .first()
            .is_some_and(|r| r.status == NotificationStatus::Sent)
    })
    .await;
    assert_eq!(repo.all()[0].recipient, "system");

    running.stop().await;
}
