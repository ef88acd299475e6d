use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    Playable,
    Withdrawable,
    IsSynthetic,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum LedgerEntries {
    Table,
    Id,
    AccountId,
    SessionId,
    Kind,
    Amount,
    PlayableDelta,
    WithdrawableDelta,
    Status,
    ExternalRef,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Sessions {
    Table,
    Id,
    GameKind,
    PartySize,
    EntryFee,
    PrizePool,
    Status,
    TerminationReason,
    WinnerId,
    CurrentSeat,
    TurnNo,
    RngSeed,
    Payload,
    Version,
    CreatedAt,
    StartedAt,
    FinishedAt,
}

#[derive(Iden)]
enum Participants {
    Table,
    Id,
    SessionId,
    UserId,
    Seat,
    Score,
    ScoreTurn,
    Lifelines,
    Status,
    IsSynthetic,
    DisconnectedAt,
    CreatedAt,
}

#[derive(Iden)]
enum WaitingEntries {
    Table,
    Id,
    UserId,
    GameKind,
    PartySize,
    EntryFee,
    IsSynthetic,
    CreatedAt,
}

#[derive(Iden)]
enum SettlementRecords {
    Table,
    SessionId,
    Outcome,
    SettledAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // accounts (id mirrors the user id, so no auto increment)
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Accounts::Playable)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Accounts::Playable).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Accounts::Withdrawable)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Accounts::Withdrawable).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Accounts::IsSynthetic)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // sessions
        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sessions::Id)
                            .big_integer()
                            .not_null()
                            .primary_key()
                            .auto_increment(),
                    )
                    .col(ColumnDef::new(Sessions::GameKind).string().not_null())
                    .col(ColumnDef::new(Sessions::PartySize).small_integer().not_null())
                    .col(ColumnDef::new(Sessions::EntryFee).big_integer().not_null())
                    .col(ColumnDef::new(Sessions::PrizePool).big_integer().not_null())
                    .col(ColumnDef::new(Sessions::Status).string().not_null())
                    .col(ColumnDef::new(Sessions::TerminationReason).string().null())
                    .col(ColumnDef::new(Sessions::WinnerId).big_integer().null())
                    .col(ColumnDef::new(Sessions::CurrentSeat).small_integer().null())
                    .col(
                        ColumnDef::new(Sessions::TurnNo)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Sessions::RngSeed).big_integer().not_null())
                    .col(ColumnDef::new(Sessions::Payload).text().not_null())
                    .col(
                        ColumnDef::new(Sessions::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Sessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sessions::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Sessions::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_sessions_status")
                    .table(Sessions::Table)
                    .col(Sessions::Status)
                    .to_owned(),
            )
            .await?;

        // ledger_entries
        manager
            .create_table(
                Table::create()
                    .table(LedgerEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerEntries::Id)
                            .big_integer()
                            .not_null()
                            .primary_key()
                            .auto_increment(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::AccountId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::SessionId).big_integer().null())
                    .col(ColumnDef::new(LedgerEntries::Kind).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::Amount)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(LedgerEntries::Amount).gt(0)),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::PlayableDelta)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::WithdrawableDelta)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::Status).string().not_null())
                    .col(ColumnDef::new(LedgerEntries::ExternalRef).string().null())
                    .col(
                        ColumnDef::new(LedgerEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ledger_entries_account")
                            .from(LedgerEntries::Table, LedgerEntries::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one entry per (account, session, kind). NULL session ids do not
        // collide, so external movements are keyed separately below.
        manager
            .create_index(
                Index::create()
                    .name("ux_ledger_entries_account_session_kind")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::AccountId)
                    .col(LedgerEntries::SessionId)
                    .col(LedgerEntries::Kind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ux_ledger_entries_kind_external_ref")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::Kind)
                    .col(LedgerEntries::ExternalRef)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // participants
        manager
            .create_table(
                Table::create()
                    .table(Participants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Participants::Id)
                            .big_integer()
                            .not_null()
                            .primary_key()
                            .auto_increment(),
                    )
                    .col(
                        ColumnDef::new(Participants::SessionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Participants::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Participants::Seat).small_integer().not_null())
                    .col(
                        ColumnDef::new(Participants::Score)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Participants::ScoreTurn).integer().null())
                    .col(ColumnDef::new(Participants::Lifelines).small_integer().not_null())
                    .col(ColumnDef::new(Participants::Status).string().not_null())
                    .col(
                        ColumnDef::new(Participants::IsSynthetic)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Participants::DisconnectedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Participants::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_participants_session")
                            .from(Participants::Table, Participants::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ux_participants_session_user")
                    .table(Participants::Table)
                    .col(Participants::SessionId)
                    .col(Participants::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ux_participants_session_seat")
                    .table(Participants::Table)
                    .col(Participants::SessionId)
                    .col(Participants::Seat)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_participants_user")
                    .table(Participants::Table)
                    .col(Participants::UserId)
                    .to_owned(),
            )
            .await?;

        // waiting_entries: one live entry per user across all pools
        manager
            .create_table(
                Table::create()
                    .table(WaitingEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WaitingEntries::Id)
                            .big_integer()
                            .not_null()
                            .primary_key()
                            .auto_increment(),
                    )
                    .col(
                        ColumnDef::new(WaitingEntries::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WaitingEntries::GameKind).string().not_null())
                    .col(
                        ColumnDef::new(WaitingEntries::PartySize)
                            .small_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WaitingEntries::EntryFee)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WaitingEntries::IsSynthetic)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(WaitingEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ux_waiting_entries_user")
                    .table(WaitingEntries::Table)
                    .col(WaitingEntries::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_waiting_entries_pool")
                    .table(WaitingEntries::Table)
                    .col(WaitingEntries::GameKind)
                    .col(WaitingEntries::PartySize)
                    .col(WaitingEntries::EntryFee)
                    .col(WaitingEntries::Id)
                    .to_owned(),
            )
            .await?;

        // settlement_records: existence means the session's payout already happened
        manager
            .create_table(
                Table::create()
                    .table(SettlementRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SettlementRecords::SessionId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SettlementRecords::Outcome).string().not_null())
                    .col(
                        ColumnDef::new(SettlementRecords::SettledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_settlement_records_session")
                            .from(SettlementRecords::Table, SettlementRecords::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SettlementRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WaitingEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Participants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}
