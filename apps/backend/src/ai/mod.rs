//! Move selection for synthetic participants.

mod random;
mod recall;
pub mod registry;
mod trait_def;

pub use random::RandomPlayer;
pub use recall::RecallPlayer;
pub use registry::{by_name, registered, ProviderFactory};
pub use trait_def::{AiError, Decision, MoveDecisionProvider};
