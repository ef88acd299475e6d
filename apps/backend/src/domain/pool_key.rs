use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::domain::{DomainError, ValidationKind};

pub const MIN_PARTY_SIZE: u8 = 2;
pub const MAX_PARTY_SIZE: u8 = 8;

/// One matchmaking bucket: (game kind, party size, entry fee).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolKey {
    pub game_kind: String,
    pub party_size: u8,
    pub entry_fee: i64,
}

impl PoolKey {
    pub fn new(
        game_kind: impl Into<String>,
        party_size: u8,
        entry_fee: i64,
    ) -> Result<Self, DomainError> {
        let game_kind = game_kind.into();
        if game_kind.trim().is_empty() || game_kind.len() > 64 {
            return Err(DomainError::validation(
                ValidationKind::InvalidPoolKey,
                "game kind must be 1..=64 characters",
            ));
        }
        if !(MIN_PARTY_SIZE..=MAX_PARTY_SIZE).contains(&party_size) {
            return Err(DomainError::validation(
                ValidationKind::InvalidPoolKey,
                format!("party size must be between {MIN_PARTY_SIZE} and {MAX_PARTY_SIZE}"),
            ));
        }
        if entry_fee < 0 {
            return Err(DomainError::validation(
                ValidationKind::InvalidPoolKey,
                "entry fee cannot be negative",
            ));
        }
        Ok(Self {
            game_kind,
            party_size,
            entry_fee,
        })
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.game_kind, self.party_size, self.entry_fee)
    }
}
