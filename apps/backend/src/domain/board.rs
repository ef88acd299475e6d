use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::seed_derivation::derive_board_seed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    Hidden,
    Revealed,
    Matched { by: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub face: u8,
    pub state: CardState,
}

/// Pair-matching board: every face appears exactly twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub cards: Vec<Card>,
}

impl Board {
    /// Shuffle `pairs` pairs deterministically from the session seed.
    pub fn shuffled(pairs: usize, session_seed: i64) -> Self {
        let mut faces: Vec<u8> = (0..pairs)
            .flat_map(|f| {
                let f = f as u8;
                [f, f]
            })
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(derive_board_seed(session_seed));
        faces.shuffle(&mut rng);
        Self {
            cards: faces
                .into_iter()
                .map(|face| Card {
                    face,
                    state: CardState::Hidden,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Card> {
        self.cards.get(position)
    }

    pub fn is_hidden(&self, position: usize) -> bool {
        matches!(self.get(position), Some(c) if c.state == CardState::Hidden)
    }

    pub fn hidden_positions(&self) -> Vec<usize> {
        self.cards
            .iter()
            .enumerate()
            .filter(|(_, c)| c.state == CardState::Hidden)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn all_matched(&self) -> bool {
        self.cards
            .iter()
            .all(|c| matches!(c.state, CardState::Matched { .. }))
    }

    pub(crate) fn set_state(&mut self, position: usize, state: CardState) {
        if let Some(card) = self.cards.get_mut(position) {
            card.state = state;
        }
    }
}
