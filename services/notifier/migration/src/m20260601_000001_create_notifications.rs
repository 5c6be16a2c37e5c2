use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notifications::MessageId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Notifications::Type).string().not_null())
                    .col(ColumnDef::new(Notifications::Channel).string().not_null())
                    .col(ColumnDef::new(Notifications::Recipient).string().not_null())
                    .col(ColumnDef::new(Notifications::Subject).string())
                    .col(ColumnDef::new(Notifications::Message).text().not_null())
                    .col(ColumnDef::new(Notifications::TemplateData).json_binary())
                    .col(
                        ColumnDef::new(Notifications::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Notifications::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Notifications::MaxAttempts)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(ColumnDef::new(Notifications::LastError).text())
                    .col(ColumnDef::new(Notifications::NextAttemptAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Notifications::SentAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Notifications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Notifications::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Notifications::Attempts).lte(Expr::col(Notifications::MaxAttempts)))
                    .to_owned(),
            )
            .await?;

        // Retry sweep: status = 'retry' ordered by next_attempt_at.
        manager
            .create_index(
                Index::create()
                    .table(Notifications::Table)
                    .col(Notifications::Status)
                    .col(Notifications::NextAttemptAt)
                    .name("idx_notifications_status_next_attempt_at")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Notifications::Table)
                    .col((Notifications::CreatedAt, IndexOrder::Desc))
                    .name("idx_notifications_created_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Notifications {
    Table,
    MessageId,
    Type,
    Channel,
    Recipient,
    Subject,
    Message,
    TemplateData,
    Status,
    Attempts,
    MaxAttempts,
    LastError,
    NextAttemptAt,
    SentAt,
    CreatedAt,
    UpdatedAt,
}
