//! Storage access, generic over `ConnectionTrait` so every function composes
//! inside a caller's transaction.

pub mod accounts;
pub mod ledger_entries;
pub mod participants;
pub mod sessions;
pub mod settlements;
pub mod waiting;
