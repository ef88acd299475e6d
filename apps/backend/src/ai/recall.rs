//! Remembers every face it has seen and completes known pairs.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::prelude::*;

use super::random::think_time;
use super::trait_def::{AiError, Decision, MoveDecisionProvider};
use crate::domain::Board;

struct Memory {
    rng: StdRng,
    seen: HashMap<usize, u8>,
}

pub struct RecallPlayer {
    memory: Mutex<Memory>,
}

impl RecallPlayer {
    pub const NAME: &'static str = "recall";
    pub const VERSION: &'static str = "1.0.0";

    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Self {
            memory: Mutex::new(Memory {
                rng,
                seen: HashMap::new(),
            }),
        }
    }
}

impl Memory {
    /// A remembered hidden position with `face`, other than `except`.
    fn recall(&self, board: &Board, face: u8, except: usize) -> Option<usize> {
        self.seen
            .iter()
            .filter(|(&pos, &f)| f == face && pos != except && board.is_hidden(pos))
            .map(|(&pos, _)| pos)
            .min()
    }

    /// Any fully remembered pair still on the board.
    fn known_pair(&self, board: &Board) -> Option<usize> {
        let mut positions: Vec<_> = self
            .seen
            .keys()
            .copied()
            .filter(|&p| board.is_hidden(p))
            .collect();
        positions.sort_unstable();
        positions
            .iter()
            .copied()
            .find(|&p| self.recall(board, self.seen[&p], p).is_some())
    }
}

impl MoveDecisionProvider for RecallPlayer {
    fn decide(&self, board: &Board, open: &[usize]) -> Result<Decision, AiError> {
        let mut mem = self
            .memory
            .lock()
            .map_err(|e| AiError::Internal(format!("memory lock poisoned: {e}")))?;

        let remembered = match open.first().and_then(|&p| board.get(p).map(|c| (p, c.face))) {
            Some((first, face)) => mem.recall(board, face, first),
            None => mem.known_pair(board),
        };

        let position = match remembered {
            Some(p) => p,
            None => {
                let hidden = board.hidden_positions();
                let unseen: Vec<_> = hidden
                    .iter()
                    .copied()
                    .filter(|p| !mem.seen.contains_key(p) && !open.contains(p))
                    .collect();
                let pool = if unseen.is_empty() { &hidden } else { &unseen };
                *pool.choose(&mut mem.rng).ok_or(AiError::NoLegalMove)?
            }
        };

        let delay = think_time(&mut mem.rng);
        Ok(Decision { position, delay })
    }

    fn observe(&self, position: usize, face: u8) {
        if let Ok(mut mem) = self.memory.lock() {
            mem.seen.insert(position, face);
        }
    }
}
