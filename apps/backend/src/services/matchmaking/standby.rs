//! Standby accounts that stand in as synthetic participants.

use sea_orm::DatabaseConnection;
use tracing::info;
use ulid::Ulid;

use crate::errors::domain::DomainError;
use crate::repos;
use crate::services::ledger::LedgerService;

/// Synthetic accounts are numbered from here, clear of real user ids.
pub const STANDBY_BASE_ID: i64 = 1_000_000_000_000;

pub struct StandbyPool {
    db: DatabaseConnection,
    ledger: LedgerService,
    topup: i64,
}

impl StandbyPool {
    pub fn new(db: DatabaseConnection, ledger: LedgerService, topup: i64) -> Self {
        Self { db, ledger, topup }
    }

    /// An idle synthetic account able to pay `entry_fee`, created and funded
    /// as needed.
    pub async fn acquire(&self, entry_fee: i64) -> Result<i64, DomainError> {
        let account_id = match repos::accounts::find_idle_synthetic(&self.db).await? {
            Some(account) => account.id,
            None => repos::accounts::max_synthetic_id(&self.db)
                .await?
                .map_or(STANDBY_BASE_ID, |max| max.max(STANDBY_BASE_ID - 1) + 1),
        };
        self.ledger.open_account(account_id, true).await?;

        let balance = self.ledger.balance(account_id).await?;
        if balance.total() < entry_fee {
            let amount = self.topup.max(entry_fee - balance.total());
            let grant_ref = format!("standby-topup:{account_id}:{}", Ulid::new());
            self.ledger.grant_bonus(account_id, amount, &grant_ref).await?;
            info!(account_id, amount, "standby account topped up");
        }
        Ok(account_id)
    }
}
