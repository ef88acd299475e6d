use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_name = "account_id")]
    pub account_id: i64,
    #[sea_orm(column_name = "session_id")]
    pub session_id: Option<i64>,
    pub kind: String,
    /// Always positive; direction is carried by the deltas
    pub amount: i64,
    #[sea_orm(column_name = "playable_delta")]
    pub playable_delta: i64,
    #[sea_orm(column_name = "withdrawable_delta")]
    pub withdrawable_delta: i64,
    pub status: String,
    #[sea_orm(column_name = "external_ref")]
    pub external_ref: Option<String>,
    #[sea_orm(column_name = "created_at")]
    pub created_at: OffsetDateTime,
    #[sea_orm(column_name = "updated_at")]
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id"
    )]
    Account,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
