use sea_orm::entity::prelude::*;

/// One reconciliation run. Append-only.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "recon_reports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub run_at: chrono::DateTime<chrono::Utc>,
    /// Serialized discrepancy list.
    pub diff: Option<Json>,
    /// `ok` or `anomalies`.
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
