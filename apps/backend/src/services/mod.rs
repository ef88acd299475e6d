pub mod ledger;
pub mod matchmaking;
pub mod sessions;
pub mod timers;
