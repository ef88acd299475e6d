//! Shared fixtures and proptest strategies for game-state tests.

use proptest::prelude::*;

use super::board::Board;
use super::game_state::{GameState, SeatState};

pub fn seats(n: u8, lifelines: u8) -> Vec<SeatState> {
    (0..n)
        .map(|i| SeatState::new(i64::from(i) + 1, i, lifelines, false))
        .collect()
}

pub fn game(pairs: usize, players: u8, seed: i64) -> GameState {
    GameState::new(Board::shuffled(pairs, seed), seats(players, 3))
}

/// Two positions holding the same face that are still hidden.
pub fn find_pair(state: &GameState) -> Option<(usize, usize)> {
    let hidden = state.board.hidden_positions();
    for (i, &a) in hidden.iter().enumerate() {
        for &b in &hidden[i + 1..] {
            if state.board.cards[a].face == state.board.cards[b].face {
                return Some((a, b));
            }
        }
    }
    None
}

/// Two hidden positions with different faces.
pub fn find_mismatch(state: &GameState) -> Option<(usize, usize)> {
    let hidden = state.board.hidden_positions();
    let a = *hidden.first()?;
    hidden
        .iter()
        .copied()
        .find(|&b| state.board.cards[b].face != state.board.cards[a].face)
        .map(|b| (a, b))
}

pub fn seed() -> impl Strategy<Value = i64> {
    any::<i64>()
}

#[derive(Debug, Clone, Copy)]
pub enum Step {
    Match,
    Mismatch,
    Timeout,
    OutOfTurn,
}

pub fn steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        prop_oneof![
            Just(Step::Match),
            Just(Step::Mismatch),
            Just(Step::Timeout),
            Just(Step::OutOfTurn),
        ],
        0..40,
    )
}
