use stockroom_domain::pagination::PageRequest;

use crate::domain::repository::NotificationRepository;
use crate::domain::types::{NotificationRecord, NotificationStatus};
use crate::error::NotifierError;

pub struct ListNotificationsUseCase<R: NotificationRepository> {
    pub repo: R,
}

impl<R: NotificationRepository> ListNotificationsUseCase<R> {
    pub async fn execute(
        &self,
        status: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<NotificationRecord>, NotifierError> {
        let status = match status.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(
                NotificationStatus::parse(s)
                    .ok_or_else(|| NotifierError::InvalidStatus(s.to_owned()))?,
            ),
            None => None,
        };
        self.repo.list(status, page.clamped()).await
    }
}
