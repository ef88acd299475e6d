use super::game_state::{Resolution, TurnPhase};
use super::status::ParticipantStatus;
use super::test_gens::{find_mismatch, find_pair, game};
use crate::errors::domain::{BusinessKind, DomainError};

#[test]
fn first_reveal_keeps_turn_open() {
    let mut g = game(4, 2, 1);
    let out = g.reveal(1, 0).unwrap();
    assert_eq!(out.resolution, Resolution::Pending);
    assert_eq!(g.open, vec![0]);
    assert_eq!(g.current_user(), Some(1));
}

#[test]
fn match_scores_and_keeps_player() {
    let mut g = game(4, 2, 2);
    let (a, b) = find_pair(&g).unwrap();
    g.reveal(1, a).unwrap();
    let out = g.reveal(1, b).unwrap();
    assert_eq!(out.resolution, Resolution::Matched { score: 1 });
    assert_eq!(g.current_user(), Some(1));
    assert_eq!(g.seat(1).unwrap().score_turn, Some(1));
    assert!(g.open.is_empty());
}

#[test]
fn mismatch_locks_until_resolved() {
    let mut g = game(4, 2, 3);
    let (a, b) = find_mismatch(&g).unwrap();
    g.reveal(1, a).unwrap();
    assert_eq!(g.reveal(1, b).unwrap().resolution, Resolution::Mismatched);
    assert_eq!(g.phase, TurnPhase::Resolving);

    let locked = g.reveal(1, g.board.hidden_positions()[0]).unwrap_err();
    assert!(locked.is_business(BusinessKind::TurnLocked));
    let early = g.reveal(2, g.board.hidden_positions()[0]).unwrap_err();
    assert!(early.is_business(BusinessKind::NotYourTurn));

    assert_eq!(g.end_resolution(), Some(2));
    assert!(g.board.is_hidden(a) && g.board.is_hidden(b));
    assert_eq!(g.phase, TurnPhase::Awaiting);
}

#[test]
fn out_of_turn_is_rejected() {
    let mut g = game(4, 2, 4);
    let err = g.reveal(2, 0).unwrap_err();
    assert!(err.is_business(BusinessKind::NotYourTurn));
    assert!(g.open.is_empty());
}

#[test]
fn strangers_are_not_participants() {
    let mut g = game(4, 2, 4);
    assert!(g.reveal(99, 0).unwrap_err().is_business(BusinessKind::NotAParticipant));
}

#[test]
fn cannot_reveal_open_or_matched_card() {
    let mut g = game(4, 2, 5);
    g.reveal(1, 0).unwrap();
    assert!(matches!(g.reveal(1, 0), Err(DomainError::Validation(..))));
    assert!(matches!(g.reveal(1, 99), Err(DomainError::Validation(..))));
}

#[test]
fn timeout_reverts_partial_reveal_and_costs_lifeline() {
    let mut g = game(4, 2, 6);
    g.reveal(1, 0).unwrap();
    let out = g.timeout().unwrap();
    assert_eq!(out.user_id, 1);
    assert_eq!(out.lifelines_left, 2);
    assert!(!out.eliminated);
    assert!(g.board.is_hidden(0));
    assert_eq!(g.current_user(), Some(2));
}

#[test]
fn last_lifeline_eliminates_and_leaves_sole_survivor() {
    let mut g = game(4, 2, 7);
    g.seats[0].lifelines = 1;
    let out = g.timeout().unwrap();
    assert!(out.eliminated);
    assert_eq!(out.sole_survivor, Some(2));
    assert_eq!(g.seat(1).unwrap().status, ParticipantStatus::Eliminated);
}

#[test]
fn elimination_in_three_way_game_continues() {
    let mut g = game(4, 3, 8);
    g.seats[0].lifelines = 1;
    let out = g.timeout().unwrap();
    assert!(out.eliminated);
    assert_eq!(out.sole_survivor, None);
    assert_eq!(g.current_user(), Some(2));
    g.end_resolution();
    // rotation skips the eliminated seat
    g.timeout().unwrap();
    assert_eq!(g.current_user(), Some(3));
    g.timeout().unwrap();
    assert_eq!(g.current_user(), Some(2));
}

#[test]
fn timeout_is_ignored_while_resolving() {
    let mut g = game(4, 2, 9);
    let (a, b) = find_mismatch(&g).unwrap();
    g.reveal(1, a).unwrap();
    g.reveal(1, b).unwrap();
    assert!(g.timeout().is_none());
}

#[test]
fn removal_of_current_player_passes_turn() {
    let mut g = game(4, 3, 10);
    g.reveal(1, 0).unwrap();
    let out = g.remove(1, ParticipantStatus::Quit).unwrap();
    assert!(out.was_current);
    assert_eq!(out.sole_survivor, None);
    assert_eq!(g.current_user(), Some(2));
    assert!(g.board.is_hidden(0));
    assert!(g.remove(1, ParticipantStatus::Quit).is_none());
}

#[test]
fn removal_down_to_one_reports_survivor() {
    let mut g = game(4, 2, 11);
    let out = g.remove(2, ParticipantStatus::Quit).unwrap();
    assert!(!out.was_current);
    assert_eq!(out.sole_survivor, Some(1));
}

#[test]
fn disconnected_players_stay_in_rotation() {
    let mut g = game(4, 2, 12);
    assert!(g.set_connected(2, false));
    assert!(!g.set_connected(2, false));
    g.timeout().unwrap();
    assert_eq!(g.current_user(), Some(2));
    assert!(g.set_connected(2, true));
    assert_eq!(g.seat(2).unwrap().status, ParticipantStatus::Active);
}

#[test]
fn clearing_board_picks_highest_score() {
    let mut g = game(2, 2, 13);
    // player 1 takes one pair, then misses
    let (a, b) = find_pair(&g).unwrap();
    g.reveal(1, a).unwrap();
    g.reveal(1, b).unwrap();
    let (c, d) = find_pair(&g).unwrap();
    g.timeout().unwrap();
    g.reveal(2, c).unwrap();
    let out = g.reveal(2, d).unwrap();
    // 1-1: player 1 reached the score first
    assert_eq!(out.resolution, Resolution::BoardCleared { winner: 1 });
}

#[test]
fn leader_breaks_ties_by_earliest_turn() {
    let mut g = game(4, 3, 14);
    g.seats[0].score = 2;
    g.seats[0].score_turn = Some(9);
    g.seats[1].score = 2;
    g.seats[1].score_turn = Some(4);
    g.seats[2].score = 1;
    g.seats[2].score_turn = Some(1);
    assert_eq!(g.leader(), Some(2));
}
