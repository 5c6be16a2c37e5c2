use chrono::{DateTime, TimeDelta, Utc};
use tracing::{error, info};

use crate::domain::repository::{DeliveryPort, NotificationRepository};
use crate::error::NotifierError;
use crate::usecase::deliver::{DeliverUseCase, DeliveryOutcome};

/// Tally of one retry-sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub picked: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
    pub exhausted: usize,
    /// Records whose status write failed; they stay as they were for the next pass.
    pub errors: usize,
}

// ── Retry sweep ──────────────────────────────────────────────────────────────

pub struct RetrySweepUseCase<R: NotificationRepository, D: DeliveryPort> {
    pub deliver: DeliverUseCase<R, D>,
    pub batch_size: u64,
    /// `pending` rows older than this lost their first attempt (crash or store error after
    /// insert) and are swept like due retries.
    pub pending_grace: TimeDelta,
}

impl<R: NotificationRepository, D: DeliveryPort> RetrySweepUseCase<R, D> {
    /// Re-attempt a bounded batch of due `retry` records and stale `pending` ones. A failure on
    /// one record does not stop the batch; only failing to read the batch is an error.
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<SweepReport, NotifierError> {
        let due = self
            .deliver
            .repo
            .find_due_retries(now, now - self.pending_grace, self.batch_size)
            .await?;
        let mut report = SweepReport {
            picked: due.len(),
            ..Default::default()
        };

        for record in &due {
            match self.deliver.execute(record).await {
                Ok(DeliveryOutcome::Sent) => report.sent += 1,
                Ok(DeliveryOutcome::Retry) => report.retried += 1,
                Ok(DeliveryOutcome::Failed) => report.failed += 1,
                Ok(DeliveryOutcome::Exhausted) => report.exhausted += 1,
                Ok(DeliveryOutcome::Skipped | DeliveryOutcome::LostRace) => {}
                Err(e) => {
                    error!(message_id = %record.message_id, error = %e, "retry attempt not recorded");
                    report.errors += 1;
                }
            }
        }

        if report.picked > 0 {
            info!(
                picked = report.picked,
                sent = report.sent,
                retried = report.retried,
                failed = report.failed,
                exhausted = report.exhausted,
                errors = report.errors,
                "retry sweep finished"
            );
        }
        Ok(report)
    }
}

// ── Cleanup ──────────────────────────────────────────────────────────────────

pub struct CleanupUseCase<R: NotificationRepository> {
    pub repo: R,
    pub retention: TimeDelta,
    pub batch_size: u64,
}

impl<R: NotificationRepository> CleanupUseCase<R> {
    /// Remove one batch of `sent` records older than the retention window.
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<u64, NotifierError> {
        let cutoff = now - self.retention;
        let removed = self
            .repo
            .delete_sent_before(cutoff, self.batch_size)
            .await?;
        if removed > 0 {
            info!(removed, cutoff = %cutoff, "removed old sent notifications");
        }
        Ok(removed)
    }
}
