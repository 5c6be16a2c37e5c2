use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::repository::{DeliveryPort, NotificationRepository};
use crate::domain::types::{NotificationRecord, NotificationStatus, StatusUpdate};
use crate::error::NotifierError;
use crate::metrics::Metrics;

/// What happened to a record on one pass through [`DeliverUseCase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    /// Attempt failed with attempts left; the sweep picks it up once due.
    Retry,
    /// Attempt failed and it was the last one.
    Failed,
    /// A `retry` record with no attempts left was closed without sending.
    Exhausted,
    /// Record already terminal; nothing sent.
    Skipped,
    /// Another writer changed the row between read and write; our write was dropped.
    LostRace,
}

// ── Deliver ──────────────────────────────────────────────────────────────────

pub struct DeliverUseCase<R: NotificationRepository, D: DeliveryPort> {
    pub repo: R,
    pub channels: D,
    pub metrics: Arc<Metrics>,
    /// Base of the exponential retry delay.
    pub backoff: Duration,
}

impl<R: NotificationRepository, D: DeliveryPort> DeliverUseCase<R, D> {
    /// Attempt one delivery of `record` and persist the resulting transition.
    ///
    /// Delivery failures are recorded on the row, not returned; only store errors are.
    pub async fn execute(
        &self,
        record: &NotificationRecord,
    ) -> Result<DeliveryOutcome, NotifierError> {
        if let Some(update) = record.exhaust(Utc::now()) {
            return self.write(record, &update).await;
        }
        if record.status.is_terminal() {
            debug!(message_id = %record.message_id, status = record.status.as_str(), "record already final");
            return Ok(DeliveryOutcome::Skipped);
        }

        let result = self.channels.send(record).await;
        let Some(update) = record.after_attempt(
            result.as_ref().map(|_| ()),
            Utc::now(),
            self.backoff,
        ) else {
            return Ok(DeliveryOutcome::Skipped);
        };
        if let Ok(sent) = &result {
            debug!(message_id = %record.message_id, provider_ref = ?sent.provider_ref, "provider accepted notification");
        }
        self.write(record, &update).await
    }

    async fn write(
        &self,
        record: &NotificationRecord,
        update: &StatusUpdate,
    ) -> Result<DeliveryOutcome, NotifierError> {
        let applied = self
            .repo
            .update_status(record.message_id, record.guard(), update)
            .await?;
        if !applied {
            warn!(
                message_id = %record.message_id,
                expected_status = record.status.as_str(),
                expected_attempts = record.attempts,
                "notification changed concurrently, status write dropped"
            );
            return Ok(DeliveryOutcome::LostRace);
        }

        let outcome = match update.status {
            NotificationStatus::Sent => {
                self.metrics.record_sent(record.kind.as_str());
                info!(
                    message_id = %record.message_id,
                    kind = record.kind.as_str(),
                    attempts = update.attempts,
                    "notification sent"
                );
                DeliveryOutcome::Sent
            }
            NotificationStatus::Retry => {
                self.metrics.record_retried();
                warn!(
                    message_id = %record.message_id,
                    kind = record.kind.as_str(),
                    attempts = update.attempts,
                    max_attempts = record.max_attempts,
                    error = update.last_error.as_deref().unwrap_or_default(),
                    "delivery failed, will retry"
                );
                DeliveryOutcome::Retry
            }
            NotificationStatus::Failed => {
                self.metrics.record_failed();
                warn!(
                    message_id = %record.message_id,
                    kind = record.kind.as_str(),
                    attempts = update.attempts,
                    error = update.last_error.as_deref().unwrap_or_default(),
                    "delivery failed permanently"
                );
                if record.status == NotificationStatus::Retry && update.attempts == record.attempts {
                    DeliveryOutcome::Exhausted
                } else {
                    DeliveryOutcome::Failed
                }
            }
            NotificationStatus::Pending => DeliveryOutcome::Skipped,
        };
        Ok(outcome)
    }
}
