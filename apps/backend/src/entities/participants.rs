use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "participants")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_name = "session_id")]
    pub session_id: i64,
    #[sea_orm(column_name = "user_id")]
    pub user_id: i64,
    #[sea_orm(column_type = "SmallInteger")]
    pub seat: i16,
    pub score: i32,
    #[sea_orm(column_name = "score_turn")]
    pub score_turn: Option<i32>,
    #[sea_orm(column_type = "SmallInteger")]
    pub lifelines: i16,
    pub status: String,
    #[sea_orm(column_name = "is_synthetic")]
    pub is_synthetic: bool,
    #[sea_orm(column_name = "disconnected_at")]
    pub disconnected_at: Option<OffsetDateTime>,
    #[sea_orm(column_name = "created_at")]
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sessions::Entity",
        from = "Column::SessionId",
        to = "super::sessions::Column::Id",
        on_delete = "Cascade"
    )]
    Session,
}

impl Related<super::sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
