//! Domain layer: pure matchmaking, money and game-state types.

pub mod board;
pub mod game_state;
pub mod money;
pub mod pool_key;
pub mod seed_derivation;
pub mod status;

pub use board::{Board, Card, CardState};
pub use game_state::{
    GameState, RemovalOutcome, Resolution, RevealOutcome, SeatState, TimeoutOutcome, TurnPhase,
};
pub use money::{prize_pool, Balance, EntryKind, EntryStatus};
pub use pool_key::PoolKey;
pub use status::{Outcome, ParticipantStatus, SessionStatus, TerminationReason};

#[cfg(test)]
mod test_gens;
#[cfg(test)]
mod tests_game_state;
#[cfg(test)]
mod tests_props_game_state;
