use arena::config::arena::ArenaConfig;
use arena::domain::{Balance, Outcome, ParticipantStatus, Resolution, SessionStatus, TerminationReason};
use arena::errors::domain::{BusinessKind, DomainError, NotFoundKind, ValidationKind};
use arena::events::ArenaEvent;
use arena::repos;
use arena::services::sessions::SessionTimer;
use arena::AppError;
use backend_test_support::unique_helpers::unique_user_id;
use futures::future::join_all;

use crate::support::factory::{
    form_session, fresh_pool, funded_user, game_of, matched_count, matching_pair,
    mismatching_pair, play_match, play_miss,
};
use crate::support::test_state::{build_test_arena, build_test_arena_with, TestArena};

fn small_board() -> ArenaConfig {
    ArenaConfig {
        board_pairs: 3,
        ..ArenaConfig::for_tests()
    }
}

async fn pair_session(arena: &TestArena) -> Result<(i64, i64, i64), AppError> {
    let a = funded_user(arena, 100).await?;
    let b = funded_user(arena, 100).await?;
    let session_id = form_session(arena, &fresh_pool(2, 50), &[a, b]).await?;
    Ok((session_id, a, b))
}

#[tokio::test]
async fn clearing_the_board_pays_the_winner() -> Result<(), AppError> {
    let arena = build_test_arena_with(small_board()).await?;
    let (session_id, a, b) = pair_session(&arena).await?;

    for _ in 0..3 {
        assert_eq!(play_match(&arena, session_id).await?, a);
    }

    assert_eq!(
        arena.ledger.balance(a).await?,
        Balance {
            playable: 50,
            withdrawable: 90
        }
    );
    assert_eq!(
        arena.ledger.balance(b).await?,
        Balance {
            playable: 50,
            withdrawable: 0
        }
    );
    let row = repos::sessions::require(&arena.db, session_id).await?;
    assert_eq!(row.status, SessionStatus::Finished.as_str());
    assert_eq!(row.termination_reason.as_deref(), Some("completed"));
    assert_eq!(row.winner_id, Some(a));
    assert!(repos::settlements::find(&arena.db, session_id).await?.is_some());
    assert!(arena.sessions.view(session_id).await.is_none());

    let to_b = arena.events.events_for(b);
    assert!(to_b.contains(&ArenaEvent::SessionEnded {
        session_id,
        reason: TerminationReason::Completed,
        winner: Some(a),
    }));
    assert!(to_b.contains(&ArenaEvent::SessionSettled {
        session_id,
        outcome: Outcome::Winner(a),
    }));
    for user in [a, b] {
        arena.ledger.reconcile(user).await?;
    }
    Ok(())
}

#[tokio::test]
async fn tie_goes_to_whoever_reached_the_score_first() -> Result<(), AppError> {
    let config = ArenaConfig {
        board_pairs: 4,
        ..ArenaConfig::for_tests()
    };
    let arena = build_test_arena_with(config).await?;
    let (session_id, a, b) = pair_session(&arena).await?;

    play_match(&arena, session_id).await?;
    play_match(&arena, session_id).await?;
    assert_eq!(play_miss(&arena, session_id).await?, a);
    assert_eq!(play_match(&arena, session_id).await?, b);
    assert_eq!(play_match(&arena, session_id).await?, b);

    let row = repos::sessions::require(&arena.db, session_id).await?;
    assert_eq!(row.winner_id, Some(a));
    assert_eq!(arena.ledger.balance(a).await?.withdrawable, 90);
    assert_eq!(arena.ledger.balance(b).await?.withdrawable, 0);
    Ok(())
}

#[tokio::test]
async fn a_match_keeps_the_turn() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let (session_id, a, _) = pair_session(&arena).await?;

    play_match(&arena, session_id).await?;

    let game = game_of(&arena, session_id).await;
    assert_eq!(game.current_user(), Some(a));
    assert_eq!(matched_count(&game), 2);
    assert_eq!(game.seat(a).map(|s| s.score), Some(1));
    Ok(())
}

#[tokio::test]
async fn acting_out_of_turn_is_rejected() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let (session_id, _, b) = pair_session(&arena).await?;

    let err = arena.sessions.act(session_id, b, 0).await.unwrap_err();

    assert!(err.is_business(BusinessKind::NotYourTurn), "{err}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn out_of_turn_actions_lose_races_with_the_current_player() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let (session_id, a, b) = pair_session(&arena).await?;
    let game = game_of(&arena, session_id).await;
    let (x, y) = mismatching_pair(&game);
    let hidden = game.board.hidden_positions();

    let sessions = arena.sessions.clone();
    let current = tokio::spawn(async move {
        sessions.act(session_id, a, x).await?;
        sessions.act(session_id, a, y).await
    });
    let intruders = hidden.into_iter().map(|position| {
        let sessions = arena.sessions.clone();
        tokio::spawn(async move { sessions.act(session_id, b, position).await })
    });
    let rejected = join_all(intruders).await;

    let second = current.await.expect("task panicked")?;
    assert_eq!(second.resolution, Resolution::Mismatched);
    for result in rejected {
        let err = result.expect("task panicked").unwrap_err();
        assert!(err.is_business(BusinessKind::NotYourTurn), "{err}");
    }
    let game = game_of(&arena, session_id).await;
    assert_eq!(game.current_user(), Some(a));
    assert_eq!(game.open, vec![x, y]);
    Ok(())
}

#[tokio::test]
async fn mismatch_locks_until_the_hold_ends() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let (session_id, a, b) = pair_session(&arena).await?;
    let game = game_of(&arena, session_id).await;
    let (x, y) = mismatching_pair(&game);

    arena.sessions.act(session_id, a, x).await?;
    let second = arena.sessions.act(session_id, a, y).await?;
    assert_eq!(second.resolution, Resolution::Mismatched);
    assert!(arena.sessions.is_timer_armed(SessionTimer::Hold(session_id)));
    assert!(!arena.sessions.is_timer_armed(SessionTimer::Turn(session_id)));

    let hidden = game_of(&arena, session_id).await.board.hidden_positions()[0];
    let err = arena.sessions.act(session_id, a, hidden).await.unwrap_err();
    assert!(err.is_business(BusinessKind::TurnLocked), "{err}");
    // the other seat is still out of turn while the pair resolves
    let err = arena.sessions.act(session_id, b, hidden).await.unwrap_err();
    assert!(err.is_business(BusinessKind::NotYourTurn), "{err}");

    assert_eq!(arena.sessions.finish_resolution(session_id).await?, Some(b));
    let game = game_of(&arena, session_id).await;
    assert!(game.board.is_hidden(x) && game.board.is_hidden(y));
    assert!(arena.sessions.is_timer_armed(SessionTimer::Turn(session_id)));
    // nothing left to resolve
    assert_eq!(arena.sessions.finish_resolution(session_id).await?, None);
    Ok(())
}

#[tokio::test]
async fn revealing_a_face_up_card_is_invalid() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let (session_id, a, _) = pair_session(&arena).await?;
    let (x, _) = matching_pair(&game_of(&arena, session_id).await);
    arena.sessions.act(session_id, a, x).await?;

    for position in [x, 10_000] {
        let err = arena.sessions.act(session_id, a, position).await.unwrap_err();
        assert!(
            matches!(err, DomainError::Validation(ValidationKind::InvalidAction, _)),
            "{err}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn strangers_and_unknown_sessions_are_rejected() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let (session_id, _, _) = pair_session(&arena).await?;

    let err = arena
        .sessions
        .act(session_id, unique_user_id(), 0)
        .await
        .unwrap_err();
    assert!(err.is_business(BusinessKind::NotAParticipant), "{err}");

    let err = arena.sessions.act(i64::MAX, 1, 0).await.unwrap_err();
    assert!(
        matches!(err, DomainError::NotFound(NotFoundKind::Session, _)),
        "{err}"
    );
    Ok(())
}

#[tokio::test]
async fn timeouts_cost_lifelines_and_pass_the_turn() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let (session_id, a, b) = pair_session(&arena).await?;

    let out = arena
        .sessions
        .expire_turn(session_id)
        .await?
        .expect("a was awaiting");

    assert_eq!(out.user_id, a);
    assert_eq!(out.lifelines_left, arena.config.lifelines - 1);
    assert!(!out.eliminated);
    assert_eq!(game_of(&arena, session_id).await.current_user(), Some(b));
    assert!(arena.events.events_for(a).contains(&ArenaEvent::LifelineLost {
        session_id,
        user_id: a,
        lifelines_left: arena.config.lifelines - 1,
    }));
    let seat = repos::participants::list(&arena.db, session_id)
        .await?
        .into_iter()
        .find(|p| p.user_id == a)
        .expect("seated");
    assert_eq!(seat.lifelines, i16::from(arena.config.lifelines - 1));
    Ok(())
}

#[tokio::test]
async fn running_out_of_lifelines_hands_the_win_over() -> Result<(), AppError> {
    let config = ArenaConfig {
        lifelines: 1,
        ..ArenaConfig::for_tests()
    };
    let arena = build_test_arena_with(config).await?;
    let (session_id, a, b) = pair_session(&arena).await?;

    let out = arena.sessions.expire_turn(session_id).await?.expect("timed out");

    assert!(out.eliminated);
    assert_eq!(out.sole_survivor, Some(b));
    let row = repos::sessions::require(&arena.db, session_id).await?;
    assert_eq!(row.termination_reason.as_deref(), Some("opponent_eliminated"));
    assert_eq!(row.winner_id, Some(b));
    assert_eq!(arena.ledger.balance(b).await?.withdrawable, 90);
    assert!(arena
        .events
        .events_for(b)
        .contains(&ArenaEvent::ParticipantEliminated {
            session_id,
            user_id: a
        }));
    Ok(())
}

#[tokio::test]
async fn quitting_forfeits_to_the_last_opponent() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let (session_id, a, b) = pair_session(&arena).await?;

    arena.sessions.quit(session_id, b).await?;

    let row = repos::sessions::require(&arena.db, session_id).await?;
    assert_eq!(row.termination_reason.as_deref(), Some("opponent_quit"));
    assert_eq!(row.winner_id, Some(a));
    assert_eq!(arena.ledger.balance(a).await?.withdrawable, 90);

    let err = arena.sessions.act(session_id, a, 0).await.unwrap_err();
    assert!(err.is_business(BusinessKind::SessionNotActive), "{err}");
    Ok(())
}

#[tokio::test]
async fn one_quit_among_three_keeps_the_game_going() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let mut users = Vec::new();
    for _ in 0..3 {
        users.push(funded_user(&arena, 50).await?);
    }
    let session_id = form_session(&arena, &fresh_pool(3, 50), &users).await?;

    // the current participant leaves; the turn moves on
    arena.sessions.quit(session_id, users[0]).await?;

    let game = game_of(&arena, session_id).await;
    assert_eq!(game.current_user(), Some(users[1]));
    assert_eq!(
        game.seat(users[0]).map(|s| s.status),
        Some(ParticipantStatus::Quit)
    );
    assert_eq!(
        repos::sessions::require(&arena.db, session_id).await?.status,
        SessionStatus::Playing.as_str()
    );
    // quitting again changes nothing
    arena.sessions.quit(session_id, users[0]).await?;

    arena.sessions.quit(session_id, users[2]).await?;
    let row = repos::sessions::require(&arena.db, session_id).await?;
    assert_eq!(row.winner_id, Some(users[1]));
    assert_eq!(arena.ledger.balance(users[1]).await?.withdrawable, 135);
    Ok(())
}
