//! Long-running side of the notifier: one supervised consumer per queue plus the periodic
//! retry, metrics and cleanup tasks. Everything stops when the shutdown flag flips to `true`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use stockroom_broker::client::{BrokerClient, DEFAULT_PREFETCH, SubscribeOptions};
use stockroom_broker::transport::Transport;
use stockroom_domain::event::{AssetEvent, EventKind, NotificationEvent, WarehouseEvent};

use crate::domain::repository::{DeliveryPort, NotificationRepository};
use crate::error::NotifierError;
use crate::metrics::Metrics;
use crate::usecase::notify::NotifyUseCase;
use crate::usecase::sweep::{CleanupUseCase, RetrySweepUseCase};

const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub prefetch: u16,
    pub handler_timeout: Option<Duration>,
    pub retry_interval: Duration,
    pub metrics_interval: Duration,
    pub cleanup_interval: Duration,
    /// Pause before subscribing again after a consumer ended or a subscribe failed.
    pub resubscribe_delay: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            prefetch: DEFAULT_PREFETCH,
            handler_timeout: Some(Duration::from_secs(30)),
            retry_interval: Duration::from_secs(30),
            metrics_interval: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(3600),
            resubscribe_delay: Duration::from_secs(5),
        }
    }
}

pub struct Worker<T: Transport, R: NotificationRepository, D: DeliveryPort> {
    pub broker: Arc<BrokerClient<T>>,
    pub notify: Arc<NotifyUseCase<R, D>>,
    pub sweep: Arc<RetrySweepUseCase<R, D>>,
    pub cleanup: Arc<CleanupUseCase<R>>,
    pub metrics: Arc<Metrics>,
    pub settings: WorkerSettings,
}

/// Spawned worker tasks.
pub struct WorkerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every task to stop. Call after flipping the shutdown flag.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "worker task ended abnormally");
            }
        }
    }
}

impl<T: Transport, R: NotificationRepository, D: DeliveryPort> Worker<T, R, D> {
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> WorkerHandle {
        let options = SubscribeOptions {
            prefetch: self.settings.prefetch,
            handler_timeout: self.settings.handler_timeout,
        };
        let delay = self.settings.resubscribe_delay;
        let mut tasks = Vec::new();

        let notify = self.notify.clone();
        let on_asset = move |event: AssetEvent| {
            let notify = notify.clone();
            async move { notify.handle_asset_event(&event).await.map(drop) }
        };
        for kind in [
            EventKind::AssetCreated,
            EventKind::AssetUpdated,
            EventKind::AssetDeleted,
        ] {
            tasks.push(tokio::spawn(consume(
                self.broker.clone(),
                kind.queue(),
                options,
                on_asset.clone(),
                shutdown.clone(),
                delay,
            )));
        }

        let notify = self.notify.clone();
        tasks.push(tokio::spawn(consume(
            self.broker.clone(),
            EventKind::WarehouseUpdated.queue(),
            options,
            move |event: WarehouseEvent| {
                let notify = notify.clone();
                async move { notify.handle_warehouse_event(&event).await.map(drop) }
            },
            shutdown.clone(),
            delay,
        )));

        let notify = self.notify.clone();
        tasks.push(tokio::spawn(consume(
            self.broker.clone(),
            EventKind::NotificationRequested.queue(),
            options,
            move |event: NotificationEvent| {
                let notify = notify.clone();
                async move { notify.handle_notification_request(&event).await.map(drop) }
            },
            shutdown.clone(),
            delay,
        )));

        let sweep = self.sweep.clone();
        tasks.push(spawn_periodic(
            "retry_sweep",
            self.settings.retry_interval,
            shutdown.clone(),
            move || {
                let sweep = sweep.clone();
                async move {
                    if let Err(e) = sweep.execute(Utc::now()).await {
                        error!(error = %e, "retry sweep failed");
                    }
                }
            },
        ));

        let metrics = self.metrics.clone();
        tasks.push(spawn_periodic(
            "metrics_log",
            self.settings.metrics_interval,
            shutdown.clone(),
            move || {
                let metrics = metrics.clone();
                async move { metrics.log() }
            },
        ));

        let cleanup = self.cleanup.clone();
        tasks.push(spawn_periodic(
            "cleanup",
            self.settings.cleanup_interval,
            shutdown,
            move || {
                let cleanup = cleanup.clone();
                async move {
                    if let Err(e) = cleanup.execute(Utc::now()).await {
                        error!(error = %e, "cleanup sweep failed");
                    }
                }
            },
        ));

        info!(tasks = tasks.len(), "notification worker started");
        WorkerHandle { tasks }
    }
}

/// Resolves once shutdown is requested or the flag's sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Keep one consumer alive on `queue` until shutdown, subscribing again whenever it ends.
async fn consume<T, M, F, Fut>(
    broker: Arc<BrokerClient<T>>,
    queue: &'static str,
    options: SubscribeOptions,
    handler: F,
    mut shutdown: watch::Receiver<bool>,
    resubscribe_delay: Duration,
) where
    T: Transport,
    M: DeserializeOwned + Send + 'static,
    F: Fn(M) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), NotifierError>> + Send + 'static,
{
    loop {
        if *shutdown.borrow() {
            break;
        }
        match broker.subscribe(queue, options, handler.clone()).await {
            Ok(mut subscription) => {
                let stopping = tokio::select! {
                    _ = subscription.closed() => false,
                    _ = stopped(&mut shutdown) => true,
                };
                if stopping {
                    subscription.cancel();
                    break;
                }
                warn!(queue, "consumer ended, subscribing again");
            }
            Err(e) => warn!(queue, error = %e, "subscribe failed"),
        }
        tokio::select! {
            _ = tokio::time::sleep(resubscribe_delay) => {}
            _ = stopped(&mut shutdown) => break,
        }
    }
    debug!(queue, "consumer supervisor stopped");
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    task: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period.max(MIN_PERIOD));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                _ = ticker.tick() => task().await,
            }
        }
        debug!(task = name, "periodic task stopped");
    })
}
