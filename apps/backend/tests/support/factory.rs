use arena::domain::{CardState, GameState, PoolKey};
use arena::AppError;
use backend_test_support::unique_helpers::{unique_str, unique_user_id};

use super::test_state::TestArena;

/// A pool key nobody else uses, so tests sharing a Postgres database never
/// match each other's entries.
pub fn fresh_pool(party_size: u8, entry_fee: i64) -> PoolKey {
    PoolKey::new(unique_str("pairs"), party_size, entry_fee).expect("valid pool key")
}

/// Open an account and deposit `amount` into playable.
pub async fn funded_user(arena: &TestArena, amount: i64) -> Result<i64, AppError> {
    let user_id = unique_user_id();
    arena.ledger.open_account(user_id, false).await?;
    if amount > 0 {
        arena
            .ledger
            .confirm_deposit(user_id, amount, &unique_str("dep"))
            .await?;
    }
    Ok(user_id)
}

/// Queue `users` in order and return the session the last join formed.
pub async fn form_session(
    arena: &TestArena,
    key: &PoolKey,
    users: &[i64],
) -> Result<i64, AppError> {
    let mut formed = Vec::new();
    for user in users {
        formed = arena.coordinator.join(*user, key.clone()).await?.formed;
    }
    assert_eq!(formed.len(), 1, "expected exactly one session to form");
    Ok(formed[0])
}

pub async fn game_of(arena: &TestArena, session_id: i64) -> GameState {
    arena
        .sessions
        .view(session_id)
        .await
        .expect("session is live")
        .game
}

/// Two hidden positions showing the same face.
pub fn matching_pair(game: &GameState) -> (usize, usize) {
    let hidden = game.board.hidden_positions();
    for (i, &a) in hidden.iter().enumerate() {
        for &b in &hidden[i + 1..] {
            if game.board.cards[a].face == game.board.cards[b].face {
                return (a, b);
            }
        }
    }
    panic!("no hidden pair left");
}

/// Two hidden positions showing different faces.
pub fn mismatching_pair(game: &GameState) -> (usize, usize) {
    let hidden = game.board.hidden_positions();
    let a = hidden[0];
    let b = hidden
        .iter()
        .copied()
        .find(|&p| game.board.cards[p].face != game.board.cards[a].face)
        .expect("board has at least two faces hidden");
    (a, b)
}

pub fn matched_count(game: &GameState) -> usize {
    game.board
        .cards
        .iter()
        .filter(|c| matches!(c.state, CardState::Matched { .. }))
        .count()
}

/// Let the current participant reveal a matching pair.
pub async fn play_match(arena: &TestArena, session_id: i64) -> Result<i64, AppError> {
    let game = game_of(arena, session_id).await;
    let user = game.current_user().expect("someone is up");
    let (a, b) = matching_pair(&game);
    arena.sessions.act(session_id, user, a).await?;
    arena.sessions.act(session_id, user, b).await?;
    Ok(user)
}

/// Let the current participant miss, then end the reveal hold.
pub async fn play_miss(arena: &TestArena, session_id: i64) -> Result<i64, AppError> {
    let game = game_of(arena, session_id).await;
    let user = game.current_user().expect("someone is up");
    let (a, b) = mismatching_pair(&game);
    arena.sessions.act(session_id, user, a).await?;
    arena.sessions.act(session_id, user, b).await?;
    arena.sessions.finish_resolution(session_id).await?;
    Ok(user)
}
