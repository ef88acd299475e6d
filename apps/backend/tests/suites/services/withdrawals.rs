use arena::domain::{Balance, EntryKind, EntryStatus};
use arena::errors::domain::{BusinessKind, ConflictKind, DomainError};
use arena::AppError;
use backend_test_support::unique_helpers::unique_email;

use crate::support::factory::funded_user;
use crate::support::test_state::{build_test_arena, TestArena};

async fn with_winnings(arena: &TestArena, playable: i64, winnings: i64) -> Result<i64, AppError> {
    let user = funded_user(arena, playable).await?;
    arena
        .ledger
        .credit(user, winnings, EntryKind::Winning, 4_000 + user)
        .await?;
    Ok(user)
}

#[tokio::test]
async fn withdrawal_only_draws_on_withdrawable() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let user = with_winnings(&arena, 500, 40).await?;

    let err = arena
        .ledger
        .request_withdrawal(user, 41, &unique_email("payout"))
        .await
        .unwrap_err();

    assert!(err.is_business(BusinessKind::InsufficientFunds), "{err}");
    assert!(arena.gateway.submitted().is_empty());
    Ok(())
}

#[tokio::test]
async fn withdrawal_reserves_and_hands_off_to_gateway() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let user = with_winnings(&arena, 0, 90).await?;
    let destination = unique_email("payout");

    let w = arena.ledger.request_withdrawal(user, 60, &destination).await?;

    assert_eq!(
        w.receipt.balance,
        Balance {
            playable: 0,
            withdrawable: 30
        }
    );
    let submitted = arena.gateway.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].payout_ref, w.payout_ref);
    assert_eq!(submitted[0].destination, destination);

    let entry = arena
        .ledger
        .history(user)
        .await?
        .into_iter()
        .find(|e| e.external_ref.as_deref() == Some(w.payout_ref.as_str()))
        .expect("withdrawal entry");
    assert_eq!(entry.status, EntryStatus::Pending.as_str());
    Ok(())
}

#[tokio::test]
async fn completion_is_idempotent() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let user = with_winnings(&arena, 0, 50).await?;
    let w = arena
        .ledger
        .request_withdrawal(user, 50, &unique_email("payout"))
        .await?;

    let first = arena.ledger.complete_withdrawal(&w.payout_ref).await?;
    let again = arena.ledger.complete_withdrawal(&w.payout_ref).await?;

    assert!(first.applied);
    assert!(!again.applied);
    assert_eq!(again.balance, Balance::default());
    arena.ledger.reconcile(user).await?;
    Ok(())
}

#[tokio::test]
async fn failed_payout_refunds_withdrawable_once() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let user = with_winnings(&arena, 0, 70).await?;
    let w = arena
        .ledger
        .request_withdrawal(user, 70, &unique_email("payout"))
        .await?;

    let refund = arena.ledger.fail_withdrawal(&w.payout_ref).await?;
    let replay = arena.ledger.fail_withdrawal(&w.payout_ref).await?;

    assert!(refund.applied);
    assert!(!replay.applied);
    assert_eq!(
        arena.ledger.balance(user).await?,
        Balance {
            playable: 0,
            withdrawable: 70
        }
    );
    arena.ledger.reconcile(user).await?;

    let err = arena
        .ledger
        .complete_withdrawal(&w.payout_ref)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(ConflictKind::Other(_), _)), "{err}");
    Ok(())
}

#[tokio::test]
async fn refused_payout_is_refunded_immediately() -> Result<(), AppError> {
    let arena = build_test_arena().await?;
    let user = with_winnings(&arena, 0, 25).await?;
    arena.gateway.refuse_next(true);

    let w = arena
        .ledger
        .request_withdrawal(user, 25, &unique_email("payout"))
        .await?;

    assert_eq!(w.receipt.balance.withdrawable, 25);
    assert!(arena.gateway.submitted().is_empty());
    let kinds: Vec<String> = arena
        .ledger
        .history(user)
        .await?
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert!(kinds.contains(&EntryKind::Refund.as_str().to_string()));
    Ok(())
}
