use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockroom_domain::id::MessageId;
use stockroom_domain::pagination::PageRequest;

use crate::domain::types::{NotificationRecord, NotificationStatus, StatusGuard, StatusUpdate};
use crate::error::{DeliveryError, NotifierError};

/// Persistence for notification records. The notifier is the only writer.
#[async_trait]
pub trait NotificationRepository: Send + Sync + 'static {
    async fn insert(&self, record: &NotificationRecord) -> Result<(), NotifierError>;

    /// Apply `update` only if the row still matches `guard`. Returns `false` when it did not
    /// (another writer got there first).
    async fn update_status(
        &self,
        message_id: MessageId,
        guard: StatusGuard,
        update: &StatusUpdate,
    ) -> Result<bool, NotifierError>;

    /// `retry` rows that are due at `now` or have no attempts left, oldest due first, followed
    /// by `pending` rows created before `stale_before`.
    async fn find_due_retries(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<NotificationRecord>, NotifierError>;

    /// Delete up to `limit` `sent` rows created before `cutoff`. Returns the count removed.
    async fn delete_sent_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> Result<u64, NotifierError>;

    /// Most recent first.
    async fn list(
        &self,
        status: Option<NotificationStatus>,
        page: PageRequest,
    ) -> Result<Vec<NotificationRecord>, NotifierError>;
}

/// Proof of a successful hand-off to a delivery provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sent {
    /// Provider-side id, when the provider returns one.
    pub provider_ref: Option<String>,
}

/// Hands a rendered notification to the medium named by its delivery kind.
#[async_trait]
pub trait DeliveryPort: Send + Sync + 'static {
    async fn send(&self, record: &NotificationRecord) -> Result<Sent, DeliveryError>;
}

#[async_trait]
impl<T: DeliveryPort + ?Sized> DeliveryPort for std::sync::Arc<T> {
    async fn send(&self, record: &NotificationRecord) -> Result<Sent, DeliveryError> {
        (**self).send(record).await
    }
}
