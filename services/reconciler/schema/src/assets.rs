use sea_orm::entity::prelude::*;

/// Asset rows as the CRUD layer stores them. Mapped here for reading only; this crate never
/// migrates or writes the table, and maps only the columns reconciliation reads.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "assets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub asset_id: String,
    pub category: String,
    pub status: String,
    pub in_warehouse: bool,
    pub qr_code: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
