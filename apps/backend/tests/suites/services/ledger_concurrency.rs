use arena::domain::EntryKind;
use arena::errors::domain::BusinessKind;
use arena::AppError;
use futures::future::join_all;

use crate::support::factory::funded_user;
use crate::support::test_state::build_test_arena;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replays_apply_once() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let user = funded_user(&arena, 100).await?;

    let calls = (0..8).map(|_| {
        let ledger = arena.ledger.clone();
        tokio::spawn(async move { ledger.debit(user, 50, EntryKind::EntryFee, 31).await })
    });
    let receipts: Vec<_> = join_all(calls)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect::<Result<_, _>>()?;

    assert_eq!(receipts.iter().filter(|r| r.applied).count(), 1);
    assert!(receipts.iter().all(|r| r.entry_id == receipts[0].entry_id));
    assert_eq!(arena.ledger.balance(user).await?.playable, 50);
    arena.ledger.reconcile(user).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_never_overdraw() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let user = funded_user(&arena, 100).await?;

    let calls = (0..5).map(|session_id| {
        let ledger = arena.ledger.clone();
        tokio::spawn(async move { ledger.debit(user, 40, EntryKind::EntryFee, session_id).await })
    });
    let results: Vec<_> = join_all(calls)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let applied = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(applied, 2);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.is_business(BusinessKind::InsufficientFunds)));
    assert_eq!(arena.ledger.balance(user).await?.playable, 20);
    arena.ledger.reconcile(user).await?;
    Ok(())
}
