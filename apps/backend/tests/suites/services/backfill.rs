use std::time::Duration;

use arena::config::arena::ArenaConfig;
use arena::domain::{Outcome, SessionStatus, TerminationReason};
use arena::events::ArenaEvent;
use arena::repos;
use arena::services::matchmaking::STANDBY_BASE_ID;
use arena::AppError;

use crate::support::factory::{fresh_pool, funded_user, game_of};
use crate::support::test_state::{build_test_arena, build_test_arena_with};

#[tokio::test]
async fn lone_player_gets_a_synthetic_opponent() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let key = fresh_pool(2, 50);
    let human = funded_user(&arena, 100).await?;
    arena.coordinator.join(human, key.clone()).await?;

    let bot = arena
        .coordinator
        .run_backfill(&key)
        .await?
        .expect("backfill queued someone");

    assert!(bot >= STANDBY_BASE_ID);
    let session_id = arena
        .events
        .events_for(human)
        .iter()
        .find_map(|e| match e {
            ArenaEvent::SessionFormed { session_id, .. } => Some(*session_id),
            _ => None,
        })
        .expect("session formed");
    let seats = repos::participants::list(&arena.db, session_id).await?;
    assert_eq!(seats.len(), 2);
    assert!(seats.iter().any(|p| p.user_id == bot && p.is_synthetic));
    assert!(seats.iter().any(|p| p.user_id == human && !p.is_synthetic));

    // the standby account was topped up, then paid its fee like anyone else
    let bot_balance = arena.ledger.balance(bot).await?;
    assert_eq!(bot_balance.total(), arena.config.standby_topup - 50);
    arena.ledger.reconcile(bot).await?;
    Ok(())
}

#[tokio::test]
async fn backfill_needs_a_genuine_participant() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let key = fresh_pool(2, 50);

    assert_eq!(arena.coordinator.run_backfill(&key).await?, None);
    assert!(repos::waiting::list_pool(&arena.db, &key).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn leaving_removes_orphaned_synthetic_entries() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let key = fresh_pool(3, 10);
    let human = funded_user(&arena, 100).await?;
    arena.coordinator.join(human, key.clone()).await?;
    let bot = arena.coordinator.run_backfill(&key).await?.expect("queued");
    assert_eq!(repos::waiting::list_pool(&arena.db, &key).await?.len(), 2);

    arena.coordinator.leave(human).await?;

    assert!(repos::waiting::list_pool(&arena.db, &key).await?.is_empty());
    assert!(repos::waiting::find_by_user(&arena.db, bot).await?.is_none());
    assert!(!arena.coordinator.is_backfill_armed(&key));
    Ok(())
}

#[tokio::test]
async fn idle_standby_accounts_are_reused() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let first_key = fresh_pool(3, 0);
    let human = funded_user(&arena, 0).await?;
    arena.coordinator.join(human, first_key.clone()).await?;
    let bot = arena.coordinator.run_backfill(&first_key).await?.expect("queued");
    arena.coordinator.leave(human).await?;

    let second_key = fresh_pool(2, 0);
    let other = funded_user(&arena, 0).await?;
    arena.coordinator.join(other, second_key.clone()).await?;
    let again = arena.coordinator.run_backfill(&second_key).await?.expect("queued");

    assert_eq!(again, bot);
    Ok(())
}

#[tokio::test]
async fn quitting_against_a_bot_pays_the_bot() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let key = fresh_pool(2, 50);
    let human = funded_user(&arena, 50).await?;
    arena.coordinator.join(human, key.clone()).await?;
    let bot = arena.coordinator.run_backfill(&key).await?.expect("queued");
    let session_id = repos::sessions::open_session_for_user(&arena.db, human)
        .await?
        .expect("seated");

    arena.sessions.quit(session_id, human).await?;

    let row = repos::sessions::require(&arena.db, session_id).await?;
    assert_eq!(row.status, SessionStatus::Finished.as_str());
    assert_eq!(row.winner_id, Some(bot));
    assert!(arena.events.events_for(human).iter().any(|e| matches!(
        e,
        ArenaEvent::SessionSettled { outcome: Outcome::Winner(w), .. } if *w == bot
    )));
    Ok(())
}

#[tokio::test]
async fn bot_plays_its_turn_through_the_reveal_path() -> Result<(), AppError> {
    let config = ArenaConfig {
        board_pairs: 4,
        ..ArenaConfig::for_tests()
    };
    let arena = build_test_arena_with(config).await?;
    let key = fresh_pool(2, 0);
    let human = funded_user(&arena, 0).await?;
    arena.coordinator.join(human, key.clone()).await?;
    let bot = arena.coordinator.run_backfill(&key).await?.expect("queued");
    let session_id = repos::sessions::open_session_for_user(&arena.db, human)
        .await?
        .expect("seated");

    // human is seated first; hand the turn over with a miss
    let game = game_of(&arena, session_id).await;
    let (a, b) = crate::support::factory::mismatching_pair(&game);
    arena.sessions.act(session_id, human, a).await?;
    arena.sessions.act(session_id, human, b).await?;
    assert_eq!(arena.sessions.finish_resolution(session_id).await?, Some(bot));

    let reveals = arena.sessions.play_bot_turn(session_id).await?;

    assert!(!reveals.is_empty());
    assert!(arena.events.events_for(human).iter().any(|e| matches!(
        e,
        ArenaEvent::CardRevealed { user_id, .. } if *user_id == bot
    )));
    Ok(())
}

#[tokio::test]
async fn backfill_timer_fills_the_pool() -> Result<(), AppError> {
    let config = ArenaConfig {
        backfill_delay: Duration::from_millis(50),
        ..ArenaConfig::for_tests()
    };
    let arena = build_test_arena_with(config).await?;
    let key = fresh_pool(2, 0);
    let human = funded_user(&arena, 0).await?;
    arena.coordinator.join(human, key.clone()).await?;

    let mut formed = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if arena.events.count("session_formed") > 0 {
            formed = true;
            break;
        }
    }

    assert!(formed, "backfill timer never formed a session");
    assert!(repos::sessions::open_session_for_user(&arena.db, human)
        .await?
        .is_some());
    Ok(())
}

#[tokio::test]
async fn a_bot_awaiting_settlement_is_not_reused() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let key = fresh_pool(2, 0);
    let human = funded_user(&arena, 0).await?;
    arena.coordinator.join(human, key.clone()).await?;
    let bot = arena.coordinator.run_backfill(&key).await?.expect("queued");
    let session_id = repos::sessions::open_session_for_user(&arena.db, human)
        .await?
        .expect("seated");
    assert!(
        repos::sessions::mark_settlement_pending(
            &arena.db,
            session_id,
            TerminationReason::OpponentQuit,
            Some(human),
            None,
        )
        .await?
    );

    let other_key = fresh_pool(2, 0);
    let other = funded_user(&arena, 0).await?;
    arena.coordinator.join(other, other_key.clone()).await?;
    let second_bot = arena
        .coordinator
        .run_backfill(&other_key)
        .await?
        .expect("queued");

    assert_ne!(second_bot, bot);
    Ok(())
}
