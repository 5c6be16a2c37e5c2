use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::infra::db::DbNotificationRepository;
use crate::metrics::Metrics;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    /// The worker's counters, read by the admin surface.
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn notification_repo(&self) -> DbNotificationRepository {
        DbNotificationRepository {
            db: self.db.clone(),
        }
    }
}
