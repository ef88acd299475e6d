use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::domain::DomainError;

/// The two earmarked sub-balances of an account. Amounts are minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub playable: i64,
    pub withdrawable: i64,
}

impl Balance {
    pub fn total(&self) -> i64 {
        self.playable + self.withdrawable
    }

    /// Split a debit across the sub-balances: playable first, then withdrawable.
    /// `None` when the total cannot cover it.
    pub fn split_debit(&self, amount: i64) -> Option<(i64, i64)> {
        if amount > self.total() {
            return None;
        }
        let from_playable = amount.min(self.playable);
        Some((from_playable, amount - from_playable))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Deposit,
    EntryFee,
    Winning,
    Refund,
    Bonus,
    Withdrawal,
}

impl EntryKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::EntryFee => "ENTRY_FEE",
            Self::Winning => "WINNING",
            Self::Refund => "REFUND",
            Self::Bonus => "BONUS",
            Self::Withdrawal => "WITHDRAWAL",
        }
    }

    /// Whether a credit of this kind lands in `withdrawable`.
    pub const fn credits_withdrawable(self) -> bool {
        matches!(self, Self::Winning)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "DEPOSIT" => Self::Deposit,
            "ENTRY_FEE" => Self::EntryFee,
            "WINNING" => Self::Winning,
            "REFUND" => Self::Refund,
            "BONUS" => Self::Bonus,
            "WITHDRAWAL" => Self::Withdrawal,
            other => {
                return Err(DomainError::invariant(format!(
                    "unknown ledger entry kind '{other}'"
                )))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
}

impl EntryStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl FromStr for EntryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "PENDING" => Self::Pending,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            other => {
                return Err(DomainError::invariant(format!(
                    "unknown ledger entry status '{other}'"
                )))
            }
        })
    }
}

/// Gross entry fees minus the platform cut, rounded in the players' favour.
pub fn prize_pool(party_size: u8, entry_fee: i64, cut_bps: u32) -> i64 {
    let gross = i64::from(party_size) * entry_fee;
    gross - gross * i64::from(cut_bps) / 10_000
}
