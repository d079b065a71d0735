//! Point reads and writes of single accounts.
//!
//! The free functions take a `&mut SqliteConnection` so that the ledger can call them on an open
//! transaction; [`AccountStore`] wraps the standalone lookups callers need outside of one.

use sqlx::SqliteConnection;
use sqlx::SqlitePool;

use crate::account::Account;
use crate::account::AccountBalance;
use crate::account::AccountId;
use crate::account::AccountName;
use crate::context::Context;
use crate::error::Entity;
use crate::error::LedgerError;

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod store_tests;

/// Looks an account up by its normalized name.
///
/// # Errors
///
/// Returns an error if:
/// - No account has that name ([`LedgerError::NotFound`]).
/// - The query fails ([`LedgerError::Internal`]).
pub async fn find_by_name(conn: &mut SqliteConnection, name: &AccountName) -> Result<Account, LedgerError> {
    sqlx::query_as::<_, Account>(
        r#"
        SELECT id, name, balance, credential, created_at
          FROM accounts
         WHERE name = ?
        "#,
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| LedgerError::not_found(Entity::Account, name))
}

/// Resolves the id of the account called `name`.
///
/// # Errors
///
/// Returns an error if:
/// - No account has that name ([`LedgerError::NotFound`]).
/// - The query fails ([`LedgerError::Internal`]).
pub async fn resolve_id_by_name(conn: &mut SqliteConnection, name: &AccountName) -> Result<AccountId, LedgerError> {
    sqlx::query_scalar::<_, AccountId>("SELECT id FROM accounts WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::not_found(Entity::Account, name))
}

/// Reads the balance of account `id`.
///
/// # Errors
///
/// Returns an error if:
/// - The account does not exist ([`LedgerError::NotFound`]).
/// - The query fails ([`LedgerError::Internal`]).
pub async fn read_balance(conn: &mut SqliteConnection, id: AccountId) -> Result<AccountBalance, LedgerError> {
    let coins = sqlx::query_scalar::<_, i64>("SELECT balance FROM accounts WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::not_found(Entity::Account, id))?;

    Ok(AccountBalance { account_id: id, coins })
}

/// Persists `balance` as the current balance of its account.
///
/// # Errors
///
/// Returns an error if:
/// - The account does not exist ([`LedgerError::NotFound`]).
/// - The statement fails ([`LedgerError::Internal`]).
pub async fn write_balance(conn: &mut SqliteConnection, balance: &AccountBalance) -> Result<(), LedgerError> {
    let res = sqlx::query("UPDATE accounts SET balance = ? WHERE id = ?")
        .bind(balance.coins)
        .bind(balance.account_id)
        .execute(&mut *conn)
        .await?;

    if res.rows_affected() == 0 {
        return Err(LedgerError::not_found(Entity::Account, balance.account_id));
    }
    Ok(())
}

/// Inserts a new account row.
///
/// # Errors
///
/// Returns an error if the statement fails, including on a duplicate name ([`LedgerError::Internal`],
/// see [`crate::storage::is_unique_violation`]).
pub async fn insert(conn: &mut SqliteConnection, account: &Account) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        INSERT INTO accounts (id, name, balance, credential, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(account.id)
    .bind(&account.name)
    .bind(account.balance)
    .bind(&account.credential)
    .bind(account.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Standalone account lookups, each bound to the caller's [`Context`].
#[derive(Debug, Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

impl AccountStore {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// See [`find_by_name`].
    ///
    /// # Errors
    ///
    /// Returns [`find_by_name`] errors, or [`LedgerError::Cancelled`] / [`LedgerError::DeadlineExceeded`].
    pub async fn find_account_by_name(&self, ctx: &Context, name: &AccountName) -> Result<Account, LedgerError> {
        ctx.run(async {
            let mut conn = self.pool.acquire().await?;
            find_by_name(&mut conn, name).await
        })
        .await?
    }

    /// See [`resolve_id_by_name`].
    ///
    /// # Errors
    ///
    /// Returns [`resolve_id_by_name`] errors, or [`LedgerError::Cancelled`] / [`LedgerError::DeadlineExceeded`].
    pub async fn resolve_id_by_name(&self, ctx: &Context, name: &AccountName) -> Result<AccountId, LedgerError> {
        ctx.run(async {
            let mut conn = self.pool.acquire().await?;
            resolve_id_by_name(&mut conn, name).await
        })
        .await?
    }

    /// See [`insert`].
    ///
    /// # Errors
    ///
    /// Returns [`insert`] errors, or [`LedgerError::Cancelled`] / [`LedgerError::DeadlineExceeded`].
    pub async fn create_account(&self, ctx: &Context, account: &Account) -> Result<(), LedgerError> {
        ctx.run(async {
            let mut conn = self.pool.acquire().await?;
            insert(&mut conn, account).await
        })
        .await?
    }
}
