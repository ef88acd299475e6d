use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "waiting_entries")]
pub struct Model {
    /// Monotonic; pool order is id order
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_name = "user_id", unique)]
    pub user_id: i64,
    #[sea_orm(column_name = "game_kind")]
    pub game_kind: String,
    #[sea_orm(column_name = "party_size", column_type = "SmallInteger")]
    pub party_size: i16,
    #[sea_orm(column_name = "entry_fee")]
    pub entry_fee: i64,
    #[sea_orm(column_name = "is_synthetic")]
    pub is_synthetic: bool,
    #[sea_orm(column_name = "created_at")]
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
