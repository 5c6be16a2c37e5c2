use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use stockroom_domain::event::Severity;
use stockroom_domain::id::MessageId;
use stockroom_domain::pagination::PageRequest;
use stockroom_notifier_schema::notifications;

use crate::domain::repository::NotificationRepository;
use crate::domain::types::{
    DeliveryKind, NotificationRecord, NotificationStatus, StatusGuard, StatusUpdate,
};
use crate::error::NotifierError;

// ── Notification repository ──────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbNotificationRepository {
    pub db: DatabaseConnection,
}

#[async_trait]
impl NotificationRepository for DbNotificationRepository {
    async fn insert(&self, record: &NotificationRecord) -> Result<(), NotifierError> {
        notifications::ActiveModel {
            message_id: Set(record.message_id.0),
            kind: Set(record.kind.as_str().to_owned()),
            channel: Set(record.severity.as_str().to_owned()),
            recipient: Set(record.recipient.clone()),
            subject: Set(record.subject.clone()),
            message: Set(record.message.clone()),
            template_data: Set(record.template_data.clone()),
            status: Set(record.status.as_str().to_owned()),
            attempts: Set(to_i32(record.attempts)),
            max_attempts: Set(to_i32(record.max_attempts)),
            last_error: Set(record.last_error.clone()),
            next_attempt_at: Set(record.next_attempt_at),
            sent_at: Set(record.sent_at),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
        }
        .insert(&self.db)
        .await
        .context("insert notification")?;
        Ok(())
    }

    async fn update_status(
        &self,
        message_id: MessageId,
        guard: StatusGuard,
        update: &StatusUpdate,
    ) -> Result<bool, NotifierError> {
        let result = notifications::Entity::update_many()
            .col_expr(
                notifications::Column::Status,
                Expr::value(update.status.as_str()),
            )
            .col_expr(
                notifications::Column::Attempts,
                Expr::value(to_i32(update.attempts)),
            )
            .col_expr(
                notifications::Column::LastError,
                Expr::value(update.last_error.clone()),
            )
            .col_expr(
                notifications::Column::NextAttemptAt,
                Expr::value(update.next_attempt_at),
            )
            .col_expr(notifications::Column::SentAt, Expr::value(update.sent_at))
            .col_expr(
                notifications::Column::UpdatedAt,
                Expr::value(update.updated_at),
            )
            .filter(notifications::Column::MessageId.eq(message_id.0))
            .filter(notifications::Column::Status.eq(guard.status.as_str()))
            .filter(notifications::Column::Attempts.eq(to_i32(guard.attempts)))
            .exec(&self.db)
            .await
            .context("update notification status")?;
        Ok(result.rows_affected == 1)
    }

    async fn find_due_retries(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<NotificationRecord>, NotifierError> {
        let due_retry = Condition::all()
            .add(notifications::Column::Status.eq(NotificationStatus::Retry.as_str()))
            .add(
                Condition::any()
                    .add(notifications::Column::NextAttemptAt.is_null())
                    .add(notifications::Column::NextAttemptAt.lte(now))
                    .add(
                        Expr::col(notifications::Column::Attempts)
                            .gte(Expr::col(notifications::Column::MaxAttempts)),
                    ),
            );
        let stale_pending = Condition::all()
            .add(notifications::Column::Status.eq(NotificationStatus::Pending.as_str()))
            .add(notifications::Column::CreatedAt.lt(stale_before));
        let models = notifications::Entity::find()
            .filter(Condition::any().add(due_retry).add(stale_pending))
            .order_by_asc(notifications::Column::NextAttemptAt)
            .order_by_asc(notifications::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .context("find due retries")?;
        models.into_iter().map(record_from_model).collect()
    }

    async fn delete_sent_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> Result<u64, NotifierError> {
        let ids: Vec<Uuid> = notifications::Entity::find()
            .select_only()
            .column(notifications::Column::MessageId)
            .filter(notifications::Column::Status.eq(NotificationStatus::Sent.as_str()))
            .filter(notifications::Column::CreatedAt.lt(cutoff))
            .order_by_asc(notifications::Column::CreatedAt)
            .limit(limit)
            .into_tuple()
            .all(&self.db)
            .await
            .context("select old sent notifications")?;
        if ids.is_empty() {
            return Ok(0);
        }

        let result = notifications::Entity::delete_many()
            .filter(notifications::Column::MessageId.is_in(ids))
            .filter(notifications::Column::Status.eq(NotificationStatus::Sent.as_str()))
            .exec(&self.db)
            .await
            .context("delete old sent notifications")?;
        Ok(result.rows_affected)
    }

    async fn list(
        &self,
        status: Option<NotificationStatus>,
        page: PageRequest,
    ) -> Result<Vec<NotificationRecord>, NotifierError> {
        let mut query = notifications::Entity::find();
        if let Some(status) = status {
            query = query.filter(notifications::Column::Status.eq(status.as_str()));
        }
        let models = query
            .order_by_desc(notifications::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .context("list notifications")?;
        models.into_iter().map(record_from_model).collect()
    }
}

fn to_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn to_u32(n: i32) -> u32 {
    u32::try_from(n).unwrap_or(0)
}

fn record_from_model(model: notifications::Model) -> Result<NotificationRecord, NotifierError> {
    let kind = DeliveryKind::parse(&model.kind)
        .with_context(|| format!("unknown delivery kind {:?}", model.kind))?;
    let severity = Severity::parse(&model.channel)
        .with_context(|| format!("unknown severity {:?}", model.channel))?;
    let status = NotificationStatus::parse(&model.status)
        .with_context(|| format!("unknown notification status {:?}", model.status))?;
    Ok(NotificationRecord {
        message_id: MessageId(model.message_id),
        kind,
        severity,
        recipient: model.recipient,
        subject: model.subject,
        message: model.message,
        template_data: model.template_data,
        status,
        attempts: to_u32(model.attempts),
        max_attempts: to_u32(model.max_attempts),
        last_error: model.last_error,
        next_attempt_at: model.next_attempt_at,
        sent_at: model.sent_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}
