use std::time::Duration;

use arena::config::arena::ArenaConfig;
use arena::domain::{Balance, Outcome, ParticipantStatus, SessionStatus, TerminationReason};
use arena::events::ArenaEvent;
use arena::repos;
use arena::services::sessions::{GraceExpiry, SessionTimer};
use arena::AppError;

use crate::support::factory::{form_session, fresh_pool, funded_user, game_of};
use crate::support::test_state::{build_test_arena, build_test_arena_with, TestArena};

async fn pair_session(arena: &TestArena) -> Result<(i64, i64, i64), AppError> {
    let a = funded_user(arena, 100).await?;
    let b = funded_user(arena, 100).await?;
    let session_id = form_session(arena, &fresh_pool(2, 50), &[a, b]).await?;
    Ok((session_id, a, b))
}

#[tokio::test]
async fn lapsed_grace_refunds_everyone() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let (session_id, a, b) = pair_session(&arena).await?;

    assert!(arena.sessions.disconnect(session_id, b).await?);
    let expiry = arena.sessions.expire_grace(session_id, b).await?;

    assert_eq!(expiry, GraceExpiry::Ended(TerminationReason::NetworkIssue));
    for user in [a, b] {
        assert_eq!(
            arena.ledger.balance(user).await?,
            Balance {
                playable: 100,
                withdrawable: 0
            }
        );
        arena.ledger.reconcile(user).await?;
    }
    let row = repos::sessions::require(&arena.db, session_id).await?;
    assert_eq!(row.status, SessionStatus::Cancelled.as_str());
    assert_eq!(row.winner_id, None);
    assert!(arena.events.events_for(a).contains(&ArenaEvent::SessionEnded {
        session_id,
        reason: TerminationReason::NetworkIssue,
        winner: None,
    }));
    assert!(arena.events.events_for(a).contains(&ArenaEvent::SessionSettled {
        session_id,
        outcome: Outcome::RefundAll,
    }));
    Ok(())
}

#[tokio::test]
async fn reconnecting_in_time_keeps_the_session() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let (session_id, a, _) = pair_session(&arena).await?;
    let grace = SessionTimer::Grace {
        session_id,
        user_id: a,
    };

    arena.sessions.disconnect(session_id, a).await?;
    assert!(arena.sessions.is_timer_armed(grace));
    let away = repos::participants::list(&arena.db, session_id)
        .await?
        .into_iter()
        .find(|p| p.user_id == a)
        .expect("seated");
    assert_eq!(away.status, ParticipantStatus::Disconnected.as_str());
    assert!(away.disconnected_at.is_some());

    assert!(arena.sessions.reconnect(session_id, a).await?);
    assert!(!arena.sessions.is_timer_armed(grace));

    // a grace expiry that raced the reconnect is a no-op
    assert_eq!(
        arena.sessions.expire_grace(session_id, a).await?,
        GraceExpiry::Ignored
    );
    let game = game_of(&arena, session_id).await;
    assert_eq!(game.seat(a).map(|s| s.status), Some(ParticipantStatus::Active));
    assert_eq!(
        repos::sessions::require(&arena.db, session_id).await?.status,
        SessionStatus::Playing.as_str()
    );
    Ok(())
}

#[tokio::test]
async fn repeated_presence_signals_are_no_ops() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let (session_id, a, _) = pair_session(&arena).await?;

    assert!(!arena.sessions.reconnect(session_id, a).await?);
    assert!(arena.sessions.disconnect(session_id, a).await?);
    assert!(!arena.sessions.disconnect(session_id, a).await?);
    assert_eq!(arena.events.count("participant_disconnected"), 1);
    Ok(())
}

#[tokio::test]
async fn disconnected_participant_keeps_their_turn() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let (session_id, a, _) = pair_session(&arena).await?;

    arena.sessions.disconnect(session_id, a).await?;

    let game = game_of(&arena, session_id).await;
    assert_eq!(game.current_user(), Some(a));
    // the turn timer still runs against them
    let out = arena.sessions.expire_turn(session_id).await?.expect("timed out");
    assert_eq!(out.user_id, a);
    Ok(())
}

#[tokio::test]
async fn lapsed_grace_with_several_others_drops_only_the_absent() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let mut users = Vec::new();
    for _ in 0..3 {
        users.push(funded_user(&arena, 50).await?);
    }
    let session_id = form_session(&arena, &fresh_pool(3, 50), &users).await?;

    arena.sessions.disconnect(session_id, users[2]).await?;
    let expiry = arena.sessions.expire_grace(session_id, users[2]).await?;

    assert_eq!(expiry, GraceExpiry::Dropped);
    let game = game_of(&arena, session_id).await;
    assert_eq!(
        game.seat(users[2]).map(|s| s.status),
        Some(ParticipantStatus::Quit)
    );
    assert_eq!(
        repos::sessions::require(&arena.db, session_id).await?.status,
        SessionStatus::Playing.as_str()
    );
    Ok(())
}

#[tokio::test]
async fn grace_timer_ends_the_session_on_its_own() -> Result<(), AppError> {
    let config = ArenaConfig {
        reconnect_grace: Duration::from_millis(50),
        ..ArenaConfig::for_tests()
    };
    let arena = build_test_arena_with(config).await?;
    let (session_id, a, b) = pair_session(&arena).await?;

    arena.sessions.disconnect(session_id, b).await?;

    let mut settled = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if arena.events.count("session_settled") > 0 {
            settled = true;
            break;
        }
    }
    assert!(settled, "grace timer never fired");
    assert_eq!(arena.ledger.balance(a).await?.playable, 100);
    assert_eq!(
        repos::sessions::require(&arena.db, session_id).await?.status,
        SessionStatus::Cancelled.as_str()
    );
    Ok(())
}
