use arena::config::arena::ArenaConfig;
use arena::domain::{Balance, EntryKind, Outcome, SessionStatus, TerminationReason};
use arena::errors::domain::{BusinessKind, DomainError};
use arena::events::ArenaEvent;
use arena::repos;
use arena::services::sessions::{Settlement, SweepReport};
use arena::AppError;
use futures::future::join_all;

use crate::support::factory::{form_session, fresh_pool, funded_user, game_of, play_match};
use crate::support::test_state::{build_test_arena, wire, TestArena};

#[tokio::test]
async fn settling_twice_pays_once() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let a = funded_user(&arena, 50).await?;
    let b = funded_user(&arena, 50).await?;
    let session_id = form_session(&arena, &fresh_pool(2, 50), &[a, b]).await?;

    arena.sessions.quit(session_id, a).await?;
    let before = arena.ledger.balance(b).await?;
    assert_eq!(before.withdrawable, 90);

    let again = arena.sessions.settle(session_id).await?;
    assert_eq!(again, Settlement::AlreadySettled(Outcome::Winner(b)));
    assert_eq!(arena.ledger.balance(b).await?, before);
    assert_eq!(arena.events.count("session_settled"), 1);
    Ok(())
}

#[tokio::test]
async fn a_session_in_play_cannot_be_settled() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let a = funded_user(&arena, 50).await?;
    let b = funded_user(&arena, 50).await?;
    let session_id = form_session(&arena, &fresh_pool(2, 50), &[a, b]).await?;

    let err = arena.sessions.settle(session_id).await.unwrap_err();
    assert!(matches!(
        err,
        DomainError::Business(BusinessKind::SessionNotActive, _)
    ));
    assert_eq!(
        repos::sessions::require(&arena.db, session_id).await?.status,
        SessionStatus::Playing.as_str()
    );
    Ok(())
}

#[tokio::test]
async fn empty_sweep_reports_nothing() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    assert_eq!(arena.sessions.sweep_pending().await?, SweepReport::default());
    Ok(())
}

#[tokio::test]
async fn sweep_settles_a_pending_session() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let a = funded_user(&arena, 50).await?;
    let b = funded_user(&arena, 50).await?;
    let session_id = form_session(&arena, &fresh_pool(2, 50), &[a, b]).await?;

    // a crash between termination and settlement leaves the row pending
    let parked = repos::sessions::mark_settlement_pending(
        &arena.db,
        session_id,
        TerminationReason::NetworkIssue,
        None,
        None,
    )
    .await?;
    assert!(parked);

    let report = arena.sessions.sweep_pending().await?;
    assert!(report.settled >= 1);
    assert_eq!(report.frozen, 0);
    for user in [a, b] {
        assert_eq!(
            arena.ledger.balance(user).await?,
            Balance {
                playable: 50,
                withdrawable: 0
            }
        );
    }
    assert_eq!(
        repos::sessions::require(&arena.db, session_id).await?.status,
        SessionStatus::Cancelled.as_str()
    );
    assert!(arena.sessions.view(session_id).await.is_none());
    Ok(())
}

#[tokio::test]
async fn broken_outcome_freezes_the_session() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let a = funded_user(&arena, 50).await?;
    let b = funded_user(&arena, 50).await?;
    let session_id = form_session(&arena, &fresh_pool(2, 50), &[a, b]).await?;

    repos::sessions::mark_settlement_pending(
        &arena.db,
        session_id,
        TerminationReason::Completed,
        Some(a + b),
        None,
    )
    .await?;

    let report = arena.sessions.sweep_pending().await?;
    assert_eq!(report.frozen, 1);
    assert_eq!(
        repos::sessions::require(&arena.db, session_id).await?.status,
        SessionStatus::Frozen.as_str()
    );
    assert!(arena
        .events
        .events_for(a)
        .contains(&ArenaEvent::SessionFrozen { session_id }));
    // nothing was paid out
    assert_eq!(arena.ledger.balance(a).await?.total(), 0);
    assert_eq!(arena.ledger.balance(b).await?.total(), 0);

    // frozen sessions are left alone by later sweeps
    assert_eq!(arena.sessions.sweep_pending().await?.frozen, 0);
    Ok(())
}

#[tokio::test]
async fn restart_resumes_sessions_in_play() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let a = funded_user(&arena, 50).await?;
    let b = funded_user(&arena, 50).await?;
    let session_id = form_session(&arena, &fresh_pool(2, 50), &[a, b]).await?;
    play_match(&arena, session_id).await?;
    let before = game_of(&arena, session_id).await;

    let restarted = wire(arena.db.clone(), ArenaConfig::for_tests());
    let resumed = restarted.sessions.recover().await?;
    assert!(resumed >= 1);

    let after = game_of(&restarted, session_id).await;
    assert_eq!(after, before);
    assert_eq!(after.current_user(), Some(a));

    // play continues in the new process
    let scorer = play_match(&restarted, session_id).await?;
    assert_eq!(scorer, a);
    assert_eq!(game_of(&restarted, session_id).await.seat(a).map(|s| s.score), Some(2));

    // a second recovery pass leaves the live copy alone
    restarted.sessions.recover().await?;
    assert_eq!(game_of(&restarted, session_id).await.seat(a).map(|s| s.score), Some(2));
    Ok(())
}

async fn settle_concurrently(
    arena: &TestArena,
    session_id: i64,
    calls: usize,
) -> Result<Vec<Settlement>, AppError> {
    let calls = (0..calls).map(|_| {
        let sessions = arena.sessions.clone();
        tokio::spawn(async move { sessions.settle(session_id).await })
    });
    let results: Vec<Settlement> = join_all(calls)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect::<Result<_, _>>()?;
    Ok(results)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_settles_pay_the_winner_once() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let a = funded_user(&arena, 50).await?;
    let b = funded_user(&arena, 50).await?;
    let session_id = form_session(&arena, &fresh_pool(2, 50), &[a, b]).await?;
    assert!(
        repos::sessions::mark_settlement_pending(
            &arena.db,
            session_id,
            TerminationReason::OpponentQuit,
            Some(b),
            None,
        )
        .await?
    );

    let results = settle_concurrently(&arena, session_id, 6).await?;

    let fresh = results
        .iter()
        .filter(|r| matches!(r, Settlement::Settled(_)))
        .count();
    assert_eq!(fresh, 1);
    assert!(results.iter().all(|r| r.outcome() == Outcome::Winner(b)));
    let winnings =
        repos::ledger_entries::list_for_session(&arena.db, session_id, EntryKind::Winning).await?;
    assert_eq!(winnings.len(), 1);
    assert_eq!(winnings[0].account_id, b);
    assert_eq!(arena.ledger.balance(b).await?.withdrawable, 90);
    assert_eq!(arena.events.count("session_settled"), 1);
    arena.ledger.reconcile(b).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_settles_refund_each_fee_once() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let a = funded_user(&arena, 50).await?;
    let b = funded_user(&arena, 50).await?;
    let session_id = form_session(&arena, &fresh_pool(2, 50), &[a, b]).await?;
    assert!(
        repos::sessions::mark_settlement_pending(
            &arena.db,
            session_id,
            TerminationReason::NetworkIssue,
            None,
            None,
        )
        .await?
    );

    let results = settle_concurrently(&arena, session_id, 6).await?;

    assert!(results.iter().all(|r| r.outcome() == Outcome::RefundAll));
    let refunds =
        repos::ledger_entries::list_for_session(&arena.db, session_id, EntryKind::Refund).await?;
    assert_eq!(refunds.len(), 2);
    for user in [a, b] {
        assert_eq!(refunds.iter().filter(|e| e.account_id == user).count(), 1);
        assert_eq!(arena.ledger.balance(user).await?.playable, 50);
        arena.ledger.reconcile(user).await?;
    }
    assert_eq!(
        repos::sessions::require(&arena.db, session_id).await?.status,
        SessionStatus::Cancelled.as_str()
    );
    Ok(())
}

#[tokio::test]
async fn pending_settlement_keeps_players_out_of_new_pools() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let a = funded_user(&arena, 100).await?;
    let b = funded_user(&arena, 100).await?;
    let c = funded_user(&arena, 100).await?;
    let session_id = form_session(&arena, &fresh_pool(2, 50), &[a, b]).await?;
    assert!(
        repos::sessions::mark_settlement_pending(
            &arena.db,
            session_id,
            TerminationReason::OpponentQuit,
            Some(b),
            None,
        )
        .await?
    );

    let next = fresh_pool(2, 50);
    let err = arena.coordinator.join(a, next.clone()).await.unwrap_err();
    assert!(err.is_business(BusinessKind::AlreadyInSession), "{err}");
    arena.coordinator.join(c, next.clone()).await?;
    assert_eq!(arena.ledger.balance(a).await?.playable, 50);
    assert_eq!(
        repos::sessions::open_session_for_user(&arena.db, a).await?,
        Some(session_id)
    );

    arena.sessions.settle(session_id).await?;
    assert_eq!(repos::sessions::open_session_for_user(&arena.db, a).await?, None);
    let joined = arena.coordinator.join(a, next).await?;
    assert_eq!(joined.formed.len(), 1);
    assert_eq!(arena.ledger.balance(a).await?.playable, 0);
    Ok(())
}
