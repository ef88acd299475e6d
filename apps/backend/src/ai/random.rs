//! Uniformly random reveals.

use std::sync::Mutex;
use std::time::Duration;

use rand::prelude::*;

use super::trait_def::{AiError, Decision, MoveDecisionProvider};
use crate::domain::Board;

/// Picks any hidden card. Seedable for reproducible tests.
pub struct RandomPlayer {
    rng: Mutex<StdRng>,
}

impl RandomPlayer {
    pub const NAME: &'static str = "random";
    pub const VERSION: &'static str = "1.0.0";

    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }
}

/// Human-looking pause before a reveal.
pub(super) fn think_time(rng: &mut StdRng) -> Duration {
    Duration::from_millis(rng.random_range(600..=1_800))
}

impl MoveDecisionProvider for RandomPlayer {
    fn decide(&self, board: &Board, _open: &[usize]) -> Result<Decision, AiError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|e| AiError::Internal(format!("rng lock poisoned: {e}")))?;
        let hidden = board.hidden_positions();
        let position = *hidden.choose(&mut *rng).ok_or(AiError::NoLegalMove)?;
        Ok(Decision {
            position,
            delay: think_time(&mut rng),
        })
    }
}
