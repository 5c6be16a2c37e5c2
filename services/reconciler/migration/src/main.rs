use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    cli::run_cli(stockroom_reconciler_migration::Migrator).await;
}
