use std::time::Duration;

use arena::config::arena::ArenaConfig;
use arena::domain::{Balance, SessionStatus};
use arena::errors::domain::{BusinessKind, DomainError, ValidationKind};
use arena::events::ArenaEvent;
use arena::repos;
use arena::AppError;

use crate::support::factory::{form_session, fresh_pool, funded_user};
use crate::support::test_state::{build_test_arena, build_test_arena_with};

#[tokio::test]
async fn pair_forms_once_the_pool_is_full() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let key = fresh_pool(2, 50);
    let a = funded_user(&arena, 100).await?;
    let b = funded_user(&arena, 100).await?;

    let first = arena.coordinator.join(a, key.clone()).await?;
    assert_eq!(first.waiting, 1);
    assert!(first.formed.is_empty());
    assert!(arena.coordinator.is_backfill_armed(&key));

    let second = arena.coordinator.join(b, key.clone()).await?;
    assert_eq!(second.formed.len(), 1);
    let session_id = second.formed[0];

    let row = repos::sessions::require(&arena.db, session_id).await?;
    assert_eq!(row.prize_pool, 90);
    assert_eq!(row.status, SessionStatus::Playing.as_str());
    assert!(repos::waiting::list_pool(&arena.db, &key).await?.is_empty());
    assert!(!arena.coordinator.is_backfill_armed(&key));

    for user in [a, b] {
        assert_eq!(
            arena.ledger.balance(user).await?,
            Balance {
                playable: 50,
                withdrawable: 0
            }
        );
    }

    let view = arena.sessions.view(session_id).await.expect("live session");
    assert_eq!(view.status, SessionStatus::Playing);
    assert_eq!(view.game.current_user(), Some(a));
    assert!(arena.events.events_for(b).iter().any(|e| matches!(
        e,
        ArenaEvent::SessionFormed { session_id: id, prize_pool: 90, .. } if *id == session_id
    )));
    Ok(())
}

#[tokio::test]
async fn three_player_pool_pays_into_a_larger_prize() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let key = fresh_pool(3, 50);
    let mut users = Vec::new();
    for _ in 0..3 {
        users.push(funded_user(&arena, 50).await?);
    }

    let session_id = form_session(&arena, &key, &users).await?;

    assert_eq!(repos::sessions::require(&arena.db, session_id).await?.prize_pool, 135);
    let seated: Vec<i64> = repos::participants::list(&arena.db, session_id)
        .await?
        .iter()
        .map(|p| p.user_id)
        .collect();
    assert_eq!(seated, users);
    Ok(())
}

#[tokio::test]
async fn joining_twice_is_rejected() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let key = fresh_pool(2, 10);
    let user = funded_user(&arena, 100).await?;

    arena.coordinator.join(user, key.clone()).await?;
    let err = arena.coordinator.join(user, fresh_pool(2, 10)).await.unwrap_err();

    assert!(err.is_business(BusinessKind::AlreadyQueued), "{err}");
    assert_eq!(repos::waiting::list_pool(&arena.db, &key).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn seated_users_cannot_queue_again() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let key = fresh_pool(2, 10);
    let a = funded_user(&arena, 100).await?;
    let b = funded_user(&arena, 100).await?;
    form_session(&arena, &key, &[a, b]).await?;

    let err = arena.coordinator.join(a, key.clone()).await.unwrap_err();

    assert!(err.is_business(BusinessKind::AlreadyInSession), "{err}");
    Ok(())
}

#[tokio::test]
async fn short_balance_cannot_join() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let key = fresh_pool(2, 50);
    let poor = funded_user(&arena, 30).await?;

    let err = arena.coordinator.join(poor, key.clone()).await.unwrap_err();

    assert!(err.is_business(BusinessKind::InsufficientFunds), "{err}");
    assert!(repos::waiting::list_pool(&arena.db, &key).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn leave_removes_the_entry_once() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let key = fresh_pool(2, 50);
    let user = funded_user(&arena, 100).await?;
    arena.coordinator.join(user, key.clone()).await?;

    assert!(arena.coordinator.leave(user).await?);
    assert!(!arena.coordinator.leave(user).await?);

    assert!(repos::waiting::list_pool(&arena.db, &key).await?.is_empty());
    assert!(!arena.coordinator.is_backfill_armed(&key));
    assert_eq!(arena.events.count("queue_left"), 1);
    assert_eq!(arena.ledger.balance(user).await?.playable, 100);
    Ok(())
}

#[tokio::test]
async fn a_stale_entry_never_removes_the_newer_one() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let first = fresh_pool(2, 0);
    let second = fresh_pool(2, 0);
    let user = funded_user(&arena, 0).await?;
    arena.coordinator.join(user, first.clone()).await?;
    let stale = repos::waiting::find_by_user(&arena.db, user)
        .await?
        .expect("queued");
    assert!(arena.coordinator.leave(user).await?);
    arena.coordinator.join(user, second.clone()).await?;

    let removed = arena.coordinator.remove_entry(&stale, "test.remove").await?;

    assert!(removed.is_none());
    let pool = repos::waiting::list_pool(&arena.db, &second).await?;
    assert_eq!(pool.iter().map(|e| e.user_id).collect::<Vec<_>>(), vec![user]);
    assert!(arena.coordinator.is_backfill_armed(&second));
    assert!(arena.coordinator.leave(user).await?);
    assert!(repos::waiting::list_pool(&arena.db, &second).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn participant_who_cannot_pay_is_dropped_at_formation() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let key = fresh_pool(2, 50);
    let broke = funded_user(&arena, 50).await?;
    let payer = funded_user(&arena, 50).await?;
    arena.coordinator.join(broke, key.clone()).await?;
    // balance spent elsewhere after queueing
    arena
        .ledger
        .debit(broke, 50, arena::domain::EntryKind::EntryFee, 9_999)
        .await?;

    let joined = arena.coordinator.join(payer, key.clone()).await?;

    assert!(joined.formed.is_empty());
    let left: Vec<i64> = repos::waiting::list_pool(&arena.db, &key)
        .await?
        .iter()
        .map(|e| e.user_id)
        .collect();
    assert_eq!(left, vec![payer]);
    assert_eq!(arena.ledger.balance(payer).await?.playable, 50);
    assert!(arena
        .events
        .events_for(broke)
        .iter()
        .any(|e| matches!(e, ArenaEvent::QueueDropped { .. })));
    Ok(())
}

#[tokio::test]
async fn expired_entries_are_purged() -> Result<(), AppError> {
    let config = ArenaConfig {
        queue_ttl: Duration::from_millis(1),
        ..ArenaConfig::for_tests()
    };
    let arena = build_test_arena_with(config).await?;
    let key = fresh_pool(2, 0);
    let user = funded_user(&arena, 0).await?;
    arena.coordinator.join(user, key.clone()).await?;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let purged = arena.coordinator.purge_expired().await?;

    assert!(purged >= 1);
    assert!(repos::waiting::find_by_user(&arena.db, user).await?.is_none());
    assert!(!arena.coordinator.is_backfill_armed(&key));
    assert!(arena
        .events
        .events_for(user)
        .iter()
        .any(|e| matches!(e, ArenaEvent::QueueExpired { .. })));
    Ok(())
}

#[tokio::test]
async fn matching_pass_with_nothing_waiting_forms_nothing() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let user = funded_user(&arena, 0).await?;
    arena.coordinator.join(user, fresh_pool(4, 0)).await?;

    let formed = arena.coordinator.run_matching_pass().await?;

    assert!(formed.is_empty());
    Ok(())
}

#[test]
fn invalid_pool_keys_are_rejected() {
    let err = arena::domain::PoolKey::new("pairs", 1, 50).unwrap_err();
    assert!(matches!(
        err,
        DomainError::Validation(ValidationKind::InvalidPoolKey, _)
    ));
}
