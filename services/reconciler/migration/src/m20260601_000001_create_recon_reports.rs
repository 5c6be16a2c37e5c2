use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReconReports::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReconReports::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReconReports::RunAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(ReconReports::Diff).json_binary())
                    .col(ColumnDef::new(ReconReports::Status).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(ReconReports::Table)
                    .col((ReconReports::RunAt, IndexOrder::Desc))
                    .name("idx_recon_reports_run_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReconReports::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ReconReports {
    Table,
    Id,
    RunAt,
    Diff,
    Status,
}
