use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use stockroom_domain::event::Severity;
use stockroom_domain::id::MessageId;

use crate::error::DeliveryError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Low-stock alerts get more attempts than ordinary notifications.
pub const LOW_STOCK_MAX_ATTEMPTS: u32 = 5;
/// Utilization ratio above which a warehouse update raises a low-stock alert.
pub const LOW_STOCK_THRESHOLD: f64 = 0.90;
/// Upper bound on a single retry delay.
const MAX_BACKOFF_SECS: i64 = 24 * 60 * 60;

/// Delivery medium of a notification (stored in the `type` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    Email,
    Push,
    Sms,
    Webhook,
    Internal,
}

impl DeliveryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::Sms => "sms",
            Self::Webhook => "webhook",
            Self::Internal => "internal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Self::Email),
            "push" => Some(Self::Push),
            "sms" => Some(Self::Sms),
            "webhook" => Some(Self::Webhook),
            "internal" => Some(Self::Internal),
            _ => None,
        }
    }
}

/// `pending -> {sent | retry}`, `retry -> {sent | retry | failed}`; `sent` and `failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Retry,
}

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Retry => "retry",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            "retry" => Some(Self::Retry),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

/// A notification about to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub kind: DeliveryKind,
    pub severity: Severity,
    pub recipient: String,
    pub subject: Option<String>,
    /// Already rendered; never templated again.
    pub message: String,
    pub template_data: Option<serde_json::Value>,
    pub max_attempts: u32,
}

/// A persisted notification and its delivery state.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub message_id: MessageId,
    pub kind: DeliveryKind,
    pub severity: Severity,
    pub recipient: String,
    pub subject: Option<String>,
    pub message: String,
    pub template_data: Option<serde_json::Value>,
    pub status: NotificationStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    /// When a `retry` record becomes due for the sweep.
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The `(status, attempts)` pair a conditional write expects to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusGuard {
    pub status: NotificationStatus,
    pub attempts: u32,
}

/// Full set of delivery-state columns written by one transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: NotificationStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// A fresh `pending` record with no attempts.
    pub fn create(new: NewNotification, now: DateTime<Utc>) -> Self {
        Self {
            message_id: MessageId::generate(),
            kind: new.kind,
            severity: new.severity,
            recipient: new.recipient,
            subject: new.subject,
            message: new.message,
            template_data: new.template_data,
            status: NotificationStatus::Pending,
            attempts: 0,
            max_attempts: new.max_attempts.max(1),
            last_error: None,
            next_attempt_at: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn guard(&self) -> StatusGuard {
        StatusGuard {
            status: self.status,
            attempts: self.attempts,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// The write that records one delivery attempt, or `None` when no attempt is allowed
    /// (terminal or exhausted record).
    pub fn after_attempt(
        &self,
        result: Result<(), &DeliveryError>,
        now: DateTime<Utc>,
        backoff_base: Duration,
    ) -> Option<StatusUpdate> {
        if self.status.is_terminal() || self.is_exhausted() {
            return None;
        }
        let attempts = self.attempts + 1;
        let update = match result {
            Ok(()) => StatusUpdate {
                status: NotificationStatus::Sent,
                attempts,
                last_error: self.last_error.clone(),
                next_attempt_at: None,
                sent_at: Some(now),
                updated_at: now,
            },
            Err(e) if attempts >= self.max_attempts => StatusUpdate {
                status: NotificationStatus::Failed,
                attempts,
                last_error: Some(e.to_string()),
                next_attempt_at: None,
                sent_at: None,
                updated_at: now,
            },
            Err(e) => StatusUpdate {
                status: NotificationStatus::Retry,
                attempts,
                last_error: Some(e.to_string()),
                next_attempt_at: Some(now + retry_backoff(backoff_base, attempts)),
                sent_at: None,
                updated_at: now,
            },
        };
        Some(update)
    }

    /// Close out a `retry` record that has no attempts left, without sending.
    pub fn exhaust(&self, now: DateTime<Utc>) -> Option<StatusUpdate> {
        if self.status != NotificationStatus::Retry || !self.is_exhausted() {
            return None;
        }
        Some(StatusUpdate {
            status: NotificationStatus::Failed,
            attempts: self.attempts,
            last_error: self.last_error.clone(),
            next_attempt_at: None,
            sent_at: None,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, update: &StatusUpdate) {
        self.status = update.status;
        self.attempts = update.attempts;
        self.last_error = update.last_error.clone();
        self.next_attempt_at = update.next_attempt_at;
        self.sent_at = update.sent_at;
        self.updated_at = update.updated_at;
    }
}

/// `base * 2^(attempts - 1)`, capped at one day.
pub fn retry_backoff(base: Duration, attempts: u32) -> TimeDelta {
    let shift = attempts.saturating_sub(1).min(20);
    let base_ms = i64::try_from(base.as_millis()).unwrap_or(i64::MAX);
    let delay_ms = base_ms
        .saturating_mul(1_i64 << shift)
        .min(MAX_BACKOFF_SECS * 1000);
    TimeDelta::milliseconds(delay_ms)
}
