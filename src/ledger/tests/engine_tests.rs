use std::time::Duration;

use assert2::let_assert;
use pretty_assertions::assert_eq;
use rstest::rstest;
use sqlx::Sqlite;
use sqlx::SqlitePool;
use sqlx::pool::PoolConnection;

use crate::account::AccountId;
use crate::account::BalanceError;
use crate::context::Context;
use crate::error::Entity;
use crate::error::ErrorKind;
use crate::error::LedgerError;
use crate::ledger::LedgerEngine;
use crate::ledger::RetryPolicy;
use crate::storage::test_support::balance_of;
use crate::storage::test_support::insert_account;
use crate::storage::test_support::quantity_of;
use crate::storage::test_support::temp_pool;
use crate::storage::test_support::transfer_count;

fn engine(pool: &SqlitePool) -> LedgerEngine {
    LedgerEngine::new(pool.clone(), RetryPolicy::new(3, Duration::from_millis(5)))
}

async fn setup_two_accounts(a_balance: i64, b_balance: i64) -> (tempfile::TempDir, SqlitePool, AccountId, AccountId) {
    let (dir, pool) = temp_pool().await;
    let a = insert_account(&pool, "alice", a_balance).await;
    let b = insert_account(&pool, "bob", b_balance).await;
    (dir, pool, a, b)
}

#[tokio::test]
async fn transfer_moves_coins_and_appends_one_record() {
    let (_dir, pool, a, b) = setup_two_accounts(1000, 1000).await;

    let record = engine(&pool)
        .transfer(&Context::new(), a, "bob", 300)
        .await
        .unwrap();

    assert_eq!(record.sender, a);
    assert_eq!(record.receiver, b);
    assert_eq!(record.amount.as_inner(), 300);
    assert_eq!(balance_of(&pool, a).await, 700);
    assert_eq!(balance_of(&pool, b).await, 1300);
    assert_eq!(transfer_count(&pool).await, 1);
}

#[tokio::test]
async fn transfer_resolves_receiver_name_case_insensitively() {
    let (_dir, pool, a, b) = setup_two_accounts(100, 0).await;

    engine(&pool)
        .transfer(&Context::new(), a, "  BoB ", 100)
        .await
        .unwrap();

    assert_eq!(balance_of(&pool, a).await, 0);
    assert_eq!(balance_of(&pool, b).await, 100);
}

#[tokio::test]
async fn transfer_does_not_touch_other_accounts() {
    let (_dir, pool, a, _b) = setup_two_accounts(1000, 1000).await;
    let c = insert_account(&pool, "carol", 555).await;

    engine(&pool)
        .transfer(&Context::new(), a, "bob", 1)
        .await
        .unwrap();

    assert_eq!(balance_of(&pool, c).await, 555);
}

#[tokio::test]
async fn transfer_insufficient_funds_changes_nothing() {
    let (_dir, pool, a, b) = setup_two_accounts(50, 1000).await;

    let res = engine(&pool).transfer(&Context::new(), a, "bob", 300).await;

    let_assert!(Err(LedgerError::Balance(BalanceError::InsufficientFunds { balance, amount })) = res);
    assert_eq!(balance.coins(), 50);
    assert_eq!(amount.as_inner(), 300);
    assert_eq!(balance_of(&pool, a).await, 50);
    assert_eq!(balance_of(&pool, b).await, 1000);
    assert_eq!(transfer_count(&pool).await, 0);
}

#[tokio::test]
async fn transfer_to_self_errors_and_changes_nothing() {
    let (_dir, pool, a, _b) = setup_two_accounts(1000, 1000).await;

    let res = engine(&pool).transfer(&Context::new(), a, "alice", 10).await;

    let_assert!(Err(LedgerError::SelfTransfer { account }) = res);
    assert_eq!(account, a);
    assert_eq!(balance_of(&pool, a).await, 1000);
    assert_eq!(transfer_count(&pool).await, 0);
}

#[tokio::test]
async fn transfer_to_unknown_receiver_errors_not_found() {
    let (_dir, pool, a, _b) = setup_two_accounts(1000, 1000).await;

    let res = engine(&pool).transfer(&Context::new(), a, "ghost", 10).await;

    let_assert!(Err(LedgerError::NotFound { entity: Entity::Account, key }) = res);
    assert_eq!(key, "ghost");
    assert_eq!(balance_of(&pool, a).await, 1000);
    assert_eq!(transfer_count(&pool).await, 0);
}

#[tokio::test]
async fn transfer_from_unknown_sender_errors_not_found() {
    let (_dir, pool, _a, b) = setup_two_accounts(1000, 1000).await;

    let res = engine(&pool)
        .transfer(&Context::new(), AccountId::random(), "bob", 10)
        .await;

    let_assert!(Err(error @ LedgerError::NotFound { .. }) = res);
    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert_eq!(balance_of(&pool, b).await, 1000);
}

#[rstest]
#[case(0)]
#[case(-5)]
#[tokio::test]
async fn transfer_non_positive_amount_is_rejected(#[case] amount: i64) {
    let (_dir, pool, a, b) = setup_two_accounts(1000, 1000).await;

    let res = engine(&pool).transfer(&Context::new(), a, "bob", amount).await;

    let_assert!(Err(LedgerError::InvalidAmount { amount: rejected }) = res);
    assert_eq!(rejected, amount);
    assert_eq!(balance_of(&pool, a).await, 1000);
    assert_eq!(balance_of(&pool, b).await, 1000);
}

#[tokio::test]
async fn transfer_on_cancelled_context_changes_nothing() {
    let (_dir, pool, a, b) = setup_two_accounts(1000, 1000).await;
    let ctx = Context::new();
    ctx.cancel();

    let res = engine(&pool).transfer(&ctx, a, "bob", 300).await;

    let_assert!(Err(error @ LedgerError::Cancelled) = res);
    assert_eq!(error.kind(), ErrorKind::CancelledOrTimedOut);
    assert_eq!(balance_of(&pool, a).await, 1000);
    assert_eq!(balance_of(&pool, b).await, 1000);
    assert_eq!(transfer_count(&pool).await, 0);
}

/// Holds the write lock on another connection until dropped or rolled back.
async fn hold_write_lock(pool: &SqlitePool) -> PoolConnection<Sqlite> {
    let mut conn = pool.acquire().await.unwrap();
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await.unwrap();
    conn
}

#[derive(Debug, Clone, Copy)]
enum Interruption {
    Deadline,
    Cancel,
}

#[rstest]
#[case(Interruption::Deadline)]
#[case(Interruption::Cancel)]
#[tokio::test]
async fn transfer_interrupted_after_attempt_began_changes_nothing(#[case] interruption: Interruption) {
    let (_dir, pool, a, b) = setup_two_accounts(1000, 1000).await;
    let mut writer = hold_write_lock(&pool).await;
    // The first attempt reads both balances and is aborted at its first write, then waits out a
    // backoff far longer than the interruption below.
    let engine = LedgerEngine::new(pool.clone(), RetryPolicy::new(3, Duration::from_secs(60)));
    let ctx = match interruption {
        Interruption::Deadline => Context::new().with_timeout(Duration::from_millis(200)),
        Interruption::Cancel => {
            let ctx = Context::new();
            let canceller = ctx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                canceller.cancel();
            });
            ctx
        }
    };

    let started = std::time::Instant::now();
    let res = engine.transfer(&ctx, a, "bob", 300).await;

    let_assert!(Err(error) = res);
    assert_eq!(error.kind(), ErrorKind::CancelledOrTimedOut);
    assert!(started.elapsed() < Duration::from_secs(30));
    sqlx::query("ROLLBACK").execute(&mut *writer).await.unwrap();
    assert_eq!(balance_of(&pool, a).await, 1000);
    assert_eq!(balance_of(&pool, b).await, 1000);
    assert_eq!(transfer_count(&pool).await, 0);
}

#[tokio::test]
async fn purchase_deadline_after_attempt_began_changes_nothing() {
    let (_dir, pool, a, _b) = setup_two_accounts(1000, 0).await;
    let mut writer = hold_write_lock(&pool).await;
    let engine = LedgerEngine::new(pool.clone(), RetryPolicy::new(3, Duration::from_secs(60)));
    let ctx = Context::new().with_timeout(Duration::from_millis(200));

    let res = engine.purchase(&ctx, a, "t-shirt").await;

    let_assert!(Err(LedgerError::DeadlineExceeded) = res);
    sqlx::query("ROLLBACK").execute(&mut *writer).await.unwrap();
    assert_eq!(balance_of(&pool, a).await, 1000);
    assert_eq!(quantity_of(&pool, a, "t-shirt").await, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_on_shared_account_conserve_coins() {
    let (_dir, pool, a, b) = setup_two_accounts(1000, 1000).await;
    // Both must commit, so leave room for more than the default number of conflicts.
    let engine = LedgerEngine::new(pool.clone(), RetryPolicy::new(20, Duration::from_millis(5)));

    let (to_bob, to_alice) = tokio::join!(
        {
            let engine = engine.clone();
            tokio::spawn(async move { engine.transfer(&Context::new(), a, "bob", 300).await })
        },
        {
            let engine = engine.clone();
            tokio::spawn(async move { engine.transfer(&Context::new(), b, "alice", 100).await })
        },
    );
    to_bob.unwrap().unwrap();
    to_alice.unwrap().unwrap();

    assert_eq!(balance_of(&pool, a).await, 800);
    assert_eq!(balance_of(&pool, b).await, 1200);
    assert_eq!(transfer_count(&pool).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_never_overdraw() {
    let (_dir, pool, a, b) = setup_two_accounts(500, 0).await;
    let engine = engine(&pool);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move { engine.transfer(&Context::new(), a, "bob", 200).await }));
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(error) => assert!(
                matches!(error.kind(), ErrorKind::InsufficientFunds | ErrorKind::Conflict),
                "unexpected error={error:?}"
            ),
        }
    }

    let a_after = balance_of(&pool, a).await;
    let b_after = balance_of(&pool, b).await;
    assert!(a_after >= 0);
    assert!(committed <= 2);
    assert_eq!(a_after + b_after, 500);
    assert_eq!(b_after, 200 * committed);
    assert_eq!(transfer_count(&pool).await, committed);
}

#[tokio::test]
async fn purchase_debits_price_and_increments_inventory() {
    let (_dir, pool, a, _b) = setup_two_accounts(1000, 0).await;
    let engine = engine(&pool);

    let first = engine.purchase(&Context::new(), a, "t-shirt").await.unwrap();
    assert_eq!(first.quantity, 1);
    assert_eq!(balance_of(&pool, a).await, 920);

    let second = engine.purchase(&Context::new(), a, "t-shirt").await.unwrap();
    assert_eq!(second.quantity, 2);
    assert_eq!(balance_of(&pool, a).await, 840);
    assert_eq!(quantity_of(&pool, a, "t-shirt").await, Some(2));
}

#[tokio::test]
async fn purchase_insufficient_funds_changes_nothing() {
    let (_dir, pool, a, _b) = setup_two_accounts(100, 0).await;

    let res = engine(&pool).purchase(&Context::new(), a, "pink-hoody").await;

    let_assert!(Err(error @ LedgerError::Balance(BalanceError::InsufficientFunds { .. })) = res);
    assert_eq!(error.kind(), ErrorKind::InsufficientFunds);
    assert_eq!(balance_of(&pool, a).await, 100);
    assert_eq!(quantity_of(&pool, a, "pink-hoody").await, None);
}

#[tokio::test]
async fn purchase_unknown_item_errors_not_found() {
    let (_dir, pool, a, _b) = setup_two_accounts(1000, 0).await;

    let res = engine(&pool).purchase(&Context::new(), a, "yacht").await;

    let_assert!(Err(LedgerError::NotFound { entity: Entity::Item, key }) = res);
    assert_eq!(key, "yacht");
    assert_eq!(balance_of(&pool, a).await, 1000);
}

#[tokio::test]
async fn purchase_exact_balance_leaves_zero() {
    let (_dir, pool, a, _b) = setup_two_accounts(10, 0).await;

    engine(&pool).purchase(&Context::new(), a, "pen").await.unwrap();

    assert_eq!(balance_of(&pool, a).await, 0);
    assert_eq!(quantity_of(&pool, a, "pen").await, Some(1));
}
