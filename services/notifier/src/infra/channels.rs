//! Delivery channels. One variant per medium; each holds its own provider settings.
//!
//! Every non-internal channel posts a JSON document to an HTTP relay. The relay's contract is
//! only the status code: 2xx is a hand-off, 4xx a rejection, anything else a provider error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ChannelsConfig, ProviderConfig};
use crate::domain::repository::{DeliveryPort, Sent};
use crate::domain::types::{DeliveryKind, NotificationRecord};
use crate::error::DeliveryError;

const ERROR_BODY_LIMIT: usize = 200;

// ── HTTP relay ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct HttpRelay {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpRelay {
    fn new(client: Client, provider: &ProviderConfig) -> Self {
        Self {
            client,
            url: provider.url.clone(),
            api_key: provider.api_key.clone(),
        }
    }

    async fn post<B: Serialize + ?Sized>(&self, body: &B) -> Result<Sent, DeliveryError> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(url = %self.url, status = status.as_u16(), error = %e, "relay response body unreadable");
                format!("(body unreadable: {e})")
            }
        };
        classify(status, &text)
    }
}

fn transport_error(e: reqwest::Error) -> DeliveryError {
    if e.is_timeout() {
        DeliveryError::Transport(format!("timed out: {e}"))
    } else {
        DeliveryError::Transport(e.to_string())
    }
}

/// Map a relay response onto a delivery result.
fn classify(status: StatusCode, body: &str) -> Result<Sent, DeliveryError> {
    if status.is_success() {
        let provider_ref = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_owned));
        return Ok(Sent { provider_ref });
    }
    let detail = format!("{} {}", status.as_u16(), truncate(body.trim()));
    if status.is_client_error() {
        Err(DeliveryError::Rejected(detail))
    } else {
        Err(DeliveryError::Provider(detail))
    }
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ── Channels ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailBody<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Clone)]
pub struct EmailChannel {
    relay: HttpRelay,
    from: String,
}

impl EmailChannel {
    async fn send(&self, record: &NotificationRecord) -> Result<Sent, DeliveryError> {
        self.relay
            .post(&EmailBody {
                from: &self.from,
                to: &record.recipient,
                subject: record.subject.as_deref().unwrap_or_default(),
                html: &record.message,
            })
            .await
    }
}

#[derive(Serialize)]
struct SmsBody<'a> {
    from: &'a str,
    to: &'a str,
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct SmsChannel {
    relay: HttpRelay,
    from: String,
}

impl SmsChannel {
    async fn send(&self, record: &NotificationRecord) -> Result<Sent, DeliveryError> {
        self.relay
            .post(&SmsBody {
                from: &self.from,
                to: &record.recipient,
                text: &record.message,
            })
            .await
    }
}

#[derive(Serialize)]
struct PushBody<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    severity: &'a str,
}

#[derive(Debug, Clone)]
pub struct PushChannel {
    relay: HttpRelay,
}

impl PushChannel {
    async fn send(&self, record: &NotificationRecord) -> Result<Sent, DeliveryError> {
        self.relay
            .post(&PushBody {
                to: &record.recipient,
                title: record.subject.as_deref().unwrap_or_default(),
                body: &record.message,
                severity: record.severity.as_str(),
            })
            .await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookBody<'a> {
    message_id: String,
    severity: &'a str,
    recipient: &'a str,
    subject: Option<&'a str>,
    message: &'a str,
    data: Option<&'a serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct WebhookChannel {
    relay: HttpRelay,
}

impl WebhookChannel {
    async fn send(&self, record: &NotificationRecord) -> Result<Sent, DeliveryError> {
        self.relay
            .post(&WebhookBody {
                message_id: record.message_id.to_string(),
                severity: record.severity.as_str(),
                recipient: &record.recipient,
                subject: record.subject.as_deref(),
                message: &record.message,
                data: record.template_data.as_ref(),
            })
            .await
    }
}

/// Delivery is the log line itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalChannel;

impl InternalChannel {
    fn send(&self, record: &NotificationRecord) -> Result<Sent, DeliveryError> {
        info!(
            target: "stockroom::notification",
            message_id = %record.message_id,
            severity = record.severity.as_str(),
            recipient = %record.recipient,
            subject = record.subject.as_deref().unwrap_or_default(),
            message = %record.message,
            "notification"
        );
        Ok(Sent::default())
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// The configured channel for each delivery kind. An unconfigured kind fails with
/// [`DeliveryError::Disabled`], which the retry state machine treats like any other failure.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    pub email: Option<EmailChannel>,
    pub sms: Option<SmsChannel>,
    pub push: Option<PushChannel>,
    pub webhook: Option<WebhookChannel>,
    pub internal: InternalChannel,
}

impl ChannelRegistry {
    /// Only the internal channel; every external kind is disabled.
    pub fn internal_only() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ChannelsConfig, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let relay = |p: &ProviderConfig| HttpRelay::new(client.clone(), p);
        Ok(Self {
            email: config.email.as_ref().map(|p| EmailChannel {
                relay: relay(p),
                from: p.from.clone().unwrap_or_default(),
            }),
            sms: config.sms.as_ref().map(|p| SmsChannel {
                relay: relay(p),
                from: p.from.clone().unwrap_or_default(),
            }),
            push: config.push.as_ref().map(|p| PushChannel { relay: relay(p) }),
            webhook: config
                .webhook
                .as_ref()
                .map(|p| WebhookChannel { relay: relay(p) }),
            internal: InternalChannel,
        })
    }

    pub fn enabled(&self) -> Vec<DeliveryKind> {
        let mut kinds = Vec::new();
        if self.email.is_some() {
            kinds.push(DeliveryKind::Email);
        }
        if self.push.is_some() {
            kinds.push(DeliveryKind::Push);
        }
        if self.sms.is_some() {
            kinds.push(DeliveryKind::Sms);
        }
        if self.webhook.is_some() {
            kinds.push(DeliveryKind::Webhook);
        }
        kinds.push(DeliveryKind::Internal);
        kinds
    }
}

#[async_trait]
impl DeliveryPort for ChannelRegistry {
    async fn send(&self, record: &NotificationRecord) -> Result<Sent, DeliveryError> {
        debug!(message_id = %record.message_id, kind = record.kind.as_str(), "delivering notification");
        match record.kind {
            DeliveryKind::Email => match &self.email {
                Some(channel) => channel.send(record).await,
                None => Err(DeliveryError::Disabled("email")),
            },
            DeliveryKind::Sms => match &self.sms {
                Some(channel) => channel.send(record).await,
                None => Err(DeliveryError::Disabled("sms")),
            },
            DeliveryKind::Push => match &self.push {
                Some(channel) => channel.send(record).await,
                None => Err(DeliveryError::Disabled("push")),
            },
            DeliveryKind::Webhook => match &self.webhook {
                Some(channel) => channel.send(record).await,
                None => Err(DeliveryError::Disabled("webhook")),
            },
            DeliveryKind::Internal => self.internal.send(record),
        }
    }
}
