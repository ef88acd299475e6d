use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_name = "game_kind")]
    pub game_kind: String,
    #[sea_orm(column_name = "party_size", column_type = "SmallInteger")]
    pub party_size: i16,
    #[sea_orm(column_name = "entry_fee")]
    pub entry_fee: i64,
    #[sea_orm(column_name = "prize_pool")]
    pub prize_pool: i64,
    pub status: String,
    #[sea_orm(column_name = "termination_reason")]
    pub termination_reason: Option<String>,
    #[sea_orm(column_name = "winner_id")]
    pub winner_id: Option<i64>,
    #[sea_orm(column_name = "current_seat", column_type = "SmallInteger")]
    pub current_seat: Option<i16>,
    #[sea_orm(column_name = "turn_no")]
    pub turn_no: i32,
    #[sea_orm(column_name = "rng_seed")]
    pub rng_seed: i64,
    /// Serialized board and turn state
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    pub version: i32,
    #[sea_orm(column_name = "created_at")]
    pub created_at: OffsetDateTime,
    #[sea_orm(column_name = "started_at")]
    pub started_at: Option<OffsetDateTime>,
    #[sea_orm(column_name = "finished_at")]
    pub finished_at: Option<OffsetDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::participants::Entity")]
    Participants,
    #[sea_orm(has_one = "super::settlement_records::Entity")]
    SettlementRecord,
}

impl Related<super::participants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participants.def()
    }
}

impl Related<super::settlement_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SettlementRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
