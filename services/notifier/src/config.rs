use std::time::Duration;

use chrono::TimeDelta;

use stockroom_core::config::{optional, parsed_or, required, secs_or};

use crate::domain::types::DEFAULT_MAX_ATTEMPTS;
use crate::usecase::notify::NotifySettings;
use crate::worker::WorkerSettings;

/// Endpoint and credentials of one HTTP delivery relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub url: String,
    pub api_key: Option<String>,
    /// Sender address or number, where the medium has one.
    pub from: Option<String>,
}

/// External delivery channels. `None` disables the channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelsConfig {
    pub email: Option<ProviderConfig>,
    pub sms: Option<ProviderConfig>,
    pub push: Option<ProviderConfig>,
    pub webhook: Option<ProviderConfig>,
}

impl ChannelsConfig {
    pub fn from_env() -> Self {
        let provider = |url: &str, key: Option<&str>, from: Option<&str>| {
            optional(url).map(|url| ProviderConfig {
                url,
                api_key: key.and_then(optional),
                from: from.and_then(optional),
            })
        };
        Self {
            email: provider("EMAIL_API_URL", Some("EMAIL_API_KEY"), Some("EMAIL_FROM")),
            sms: provider("SMS_API_URL", Some("SMS_API_KEY"), Some("SMS_FROM")),
            push: provider("PUSH_API_URL", Some("PUSH_API_KEY"), None),
            webhook: provider("WEBHOOK_URL", None, None),
        }
    }
}

/// Notifier configuration loaded from environment variables.
#[derive(Debug)]
pub struct NotifierConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// AMQP URL. Env var: `BROKER_URL`, falling back to `RABBITMQ_URL`.
    pub broker_url: String,
    /// TCP port for the HTTP server (default 3120). Env var: `NOTIFIER_PORT`.
    pub notifier_port: u16,
    pub prefetch: u16,
    /// `None` when `HANDLER_TIMEOUT_SECS=0`.
    pub handler_timeout: Option<Duration>,
    pub default_max_attempts: u32,
    pub retry_interval: Duration,
    pub retry_batch_size: u64,
    pub retry_backoff: Duration,
    /// Age after which a row still `pending` is treated as abandoned and re-attempted by the
    /// sweep. Env var: `PENDING_GRACE_SECS`.
    pub pending_grace_secs: i64,
    pub metrics_interval: Duration,
    pub cleanup_interval: Duration,
    pub cleanup_batch_size: u64,
    pub retention_days: i64,
    pub admin_recipient: String,
    pub warehouse_recipient: String,
    pub channels: ChannelsConfig,
    /// Timeout of every provider call. Env var: `WEBHOOK_TIMEOUT_MS`.
    pub provider_timeout: Duration,
}

impl NotifierConfig {
    pub fn from_env() -> Self {
        let handler_timeout = parsed_or("HANDLER_TIMEOUT_SECS", 30u64);
        Self {
            database_url: required("DATABASE_URL"),
            broker_url: optional("BROKER_URL")
                .or_else(|| optional("RABBITMQ_URL"))
                .unwrap_or_else(|| "amqp://localhost:5672".to_owned()),
            notifier_port: parsed_or("NOTIFIER_PORT", 3120),
            prefetch: parsed_or("BROKER_PREFETCH", 16),
            handler_timeout: (handler_timeout > 0).then(|| Duration::from_secs(handler_timeout)),
            default_max_attempts: parsed_or("DEFAULT_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS).max(1),
            retry_interval: secs_or("RETRY_SWEEP_INTERVAL_SECS", 30),
            retry_batch_size: parsed_or("RETRY_BATCH_SIZE", 10),
            retry_backoff: secs_or("RETRY_BACKOFF_SECS", 30),
            pending_grace_secs: parsed_or("PENDING_GRACE_SECS", 120),
            metrics_interval: secs_or("METRICS_LOG_INTERVAL_SECS", 300),
            cleanup_interval: secs_or("CLEANUP_INTERVAL_SECS", 3600),
            cleanup_batch_size: parsed_or("CLEANUP_BATCH_SIZE", 500),
            retention_days: parsed_or("RETENTION_DAYS", 30),
            admin_recipient: optional("ADMIN_RECIPIENT")
                .unwrap_or_else(|| "admin@inventory.local".to_owned()),
            warehouse_recipient: optional("WAREHOUSE_RECIPIENT")
                .unwrap_or_else(|| "warehouse@inventory.local".to_owned()),
            channels: ChannelsConfig::from_env(),
            provider_timeout: Duration::from_millis(parsed_or("WEBHOOK_TIMEOUT_MS", 5000)),
        }
    }

    pub fn retention(&self) -> TimeDelta {
        TimeDelta::days(self.retention_days.max(1))
    }

    /// Never shorter than the handler timeout, so an in-flight handler keeps its row.
    pub fn pending_grace(&self) -> TimeDelta {
        let floor = self.handler_timeout.map_or(0, |t| t.as_secs() as i64);
        TimeDelta::seconds(self.pending_grace_secs.max(floor).max(1))
    }

    pub fn notify_settings(&self) -> NotifySettings {
        NotifySettings {
            admin_recipient: self.admin_recipient.clone(),
            warehouse_recipient: self.warehouse_recipient.clone(),
            default_max_attempts: self.default_max_attempts,
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            prefetch: self.prefetch.max(1),
            handler_timeout: self.handler_timeout,
            retry_interval: self.retry_interval,
            metrics_interval: self.metrics_interval,
            cleanup_interval: self.cleanup_interval,
            ..WorkerSettings::default()
        }
    }
}
