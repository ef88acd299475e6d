use proptest::prelude::*;

use super::board::CardState;
use super::game_state::{Resolution, TurnPhase, REVEALS_PER_TURN};
use super::test_gens::{find_mismatch, find_pair, game, seed, steps, Step};
use crate::errors::domain::BusinessKind;

proptest! {
    #[test]
    fn invariants_hold_under_any_play(seed in seed(), plan in steps()) {
        let mut g = game(6, 3, seed);
        let mut total_score = 0u32;

        for step in plan {
            let Some(current) = g.current_user() else { break };
            if g.phase == TurnPhase::Resolving {
                g.end_resolution();
                continue;
            }
            match step {
                Step::Match => {
                    if let Some((a, b)) = find_pair(&g) {
                        g.reveal(current, a).unwrap();
                        let out = g.reveal(current, b).unwrap();
                        prop_assert!(matches!(
                            out.resolution,
                            Resolution::Matched { .. } | Resolution::BoardCleared { .. }
                        ), "expected Matched or BoardCleared resolution");
                        total_score += 1;
                        if matches!(out.resolution, Resolution::BoardCleared { .. }) {
                            break;
                        }
                    }
                }
                Step::Mismatch => {
                    if let Some((a, b)) = find_mismatch(&g) {
                        g.reveal(current, a).unwrap();
                        g.reveal(current, b).unwrap();
                        prop_assert_eq!(g.phase, TurnPhase::Resolving);
                    }
                }
                Step::Timeout => {
                    let out = g.timeout().unwrap();
                    if out.sole_survivor.is_some() {
                        break;
                    }
                }
                Step::OutOfTurn => {
                    let other = g
                        .in_rotation()
                        .map(|s| s.user_id)
                        .find(|&u| u != current);
                    if let (Some(other), Some(pos)) = (other, g.board.hidden_positions().first().copied()) {
                        let err = g.reveal(other, pos).unwrap_err();
                        prop_assert!(err.is_business(BusinessKind::NotYourTurn));
                    }
                }
            }

            // at most one turn unit of cards face up, and never a stray Revealed card
            prop_assert!(g.open.len() <= REVEALS_PER_TURN);
            let revealed = g.board.cards.iter().filter(|c| c.state == CardState::Revealed).count();
            prop_assert_eq!(revealed, g.open.len());
            // exactly one current participant, and it is in rotation
            prop_assert!(g.current_user().is_some());
        }

        let scored: u32 = g.seats.iter().map(|s| s.score).sum();
        prop_assert_eq!(scored, total_score);
        let matched = g.board.cards.iter().filter(|c| matches!(c.state, CardState::Matched { .. })).count();
        prop_assert_eq!(matched as u32, total_score * 2);
    }
}
