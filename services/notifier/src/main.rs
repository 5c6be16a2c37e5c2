use std::sync::Arc;

use sea_orm::Database;
use tokio::sync::watch;
use tracing::{info, warn};

use stockroom_broker::amqp::{AmqpTransport, redact_url};
use stockroom_broker::client::BrokerClient;
use stockroom_broker::topology::declare_topology;
use stockroom_core::tracing::init_tracing;

use stockroom_notifier::config::NotifierConfig;
use stockroom_notifier::domain::template::TemplateRegistry;
use stockroom_notifier::infra::channels::ChannelRegistry;
use stockroom_notifier::infra::db::DbNotificationRepository;
use stockroom_notifier::metrics::Metrics;
use stockroom_notifier::router::build_router;
use stockroom_notifier::state::AppState;
use stockroom_notifier::usecase::deliver::DeliverUseCase;
use stockroom_notifier::usecase::notify::NotifyUseCase;
use stockroom_notifier::usecase::sweep::{CleanupUseCase, RetrySweepUseCase};
use stockroom_notifier::worker::Worker;

#[tokio::main]
async fn main() {
    init_tracing("info,stockroom_notifier=debug");

    let config = NotifierConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let broker = Arc::new(BrokerClient::new(AmqpTransport::new(&config.broker_url)));
    declare_topology(&broker)
        .await
        .expect("failed to declare broker topology");
    info!(broker = %redact_url(&config.broker_url), "broker topology declared");

    let channels = Arc::new(
        ChannelRegistry::from_config(&config.channels, config.provider_timeout)
            .expect("failed to build HTTP client"),
    );
    let enabled: Vec<_> = channels.enabled().iter().map(|k| k.as_str()).collect();
    info!(channels = ?enabled, "delivery channels configured");

    let metrics = Arc::new(Metrics::new());
    let repo = DbNotificationRepository { db: db.clone() };
    let deliver = || DeliverUseCase {
        repo: repo.clone(),
        channels: channels.clone(),
        metrics: metrics.clone(),
        backoff: config.retry_backoff,
    };

    let worker = Worker {
        broker: broker.clone(),
        notify: Arc::new(NotifyUseCase {
            deliver: deliver(),
            templates: Arc::new(TemplateRegistry::builtin()),
            settings: config.notify_settings(),
        }),
        sweep: Arc::new(RetrySweepUseCase {
            deliver: deliver(),
            batch_size: config.retry_batch_size,
            pending_grace: config.pending_grace(),
        }),
        cleanup: Arc::new(CleanupUseCase {
            repo: repo.clone(),
            retention: config.retention(),
            batch_size: config.cleanup_batch_size,
        }),
        metrics: metrics.clone(),
        settings: config.worker_settings(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = worker.spawn(shutdown_rx);

    let router = build_router(AppState { db, metrics });
    let addr = format!("0.0.0.0:{}", config.notifier_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("notifier listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    info!("shutting down notification worker");
    if shutdown_tx.send(true).is_err() {
        warn!("worker tasks already stopped");
    }
    handle.join().await;
    broker.close().await;
    info!("notifier stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
