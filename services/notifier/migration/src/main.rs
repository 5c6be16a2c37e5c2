use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    cli::run_cli(stockroom_notifier_migration::Migrator).await;
}
