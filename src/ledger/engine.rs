use sqlx::SqlitePool;
use tracing::info;

use crate::account;
use crate::account::AccountId;
use crate::account::AccountName;
use crate::account::store;
use crate::amount::PositiveAmount;
use crate::context::Context;
use crate::error::LedgerError;
use crate::ledger::RetryPolicy;
use crate::ledger::TransferRecord;
use crate::ledger::record;
use crate::merch;
use crate::merch::InventoryEntry;

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod engine_tests;

/// Applies transfers and purchases atomically.
///
/// Every operation reads, checks and writes all the rows it touches inside one transaction.
/// SQLite transactions are serializable: a concurrent writer that invalidated what an attempt read
/// makes the store abort it, and [`RetryPolicy`] replays the whole operation from a fresh
/// transaction. No in-process locking is involved.
#[derive(Debug, Clone)]
pub struct LedgerEngine {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl LedgerEngine {
    pub const fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Moves `amount` coins from `sender` to the account called `receiver_name`, appending one
    /// [`TransferRecord`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `amount` is not positive ([`LedgerError::InvalidAmount`]), before any transaction starts.
    /// - The sender balance is lower than `amount` ([`crate::account::BalanceError::InsufficientFunds`]).
    /// - Sender or receiver do not exist ([`LedgerError::NotFound`]).
    /// - The receiver is the sender ([`LedgerError::SelfTransfer`]).
    /// - Conflicting writers aborted every attempt ([`LedgerError::Conflict`]).
    /// - `ctx` is cancelled or times out ([`LedgerError::Cancelled`], [`LedgerError::DeadlineExceeded`]).
    /// - The store fails ([`LedgerError::Internal`]).
    ///
    /// On error no row is modified.
    #[tracing::instrument(skip(self, ctx), err(Display))]
    pub async fn transfer(
        &self,
        ctx: &Context,
        sender: AccountId,
        receiver_name: &str,
        amount: i64,
    ) -> Result<TransferRecord, LedgerError> {
        let amount = PositiveAmount::try_from(amount)?;
        let receiver_name = AccountName::normalize(receiver_name);

        let record = self
            .retry
            .run(ctx, "transfer", |_| self.try_transfer(sender, &receiver_name, amount))
            .await?;

        info!(%record, "transfer committed");
        Ok(record)
    }

    /// Sells one `item` to `account_id`, debiting its price and adding it to the inventory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The account or the item do not exist ([`LedgerError::NotFound`]).
    /// - The balance is lower than the price ([`crate::account::BalanceError::InsufficientFunds`]).
    /// - Conflicting writers aborted every attempt ([`LedgerError::Conflict`]).
    /// - `ctx` is cancelled or times out ([`LedgerError::Cancelled`], [`LedgerError::DeadlineExceeded`]).
    /// - The store fails ([`LedgerError::Internal`]).
    ///
    /// On error no row is modified.
    #[tracing::instrument(skip(self, ctx), err(Display))]
    pub async fn purchase(
        &self,
        ctx: &Context,
        account_id: AccountId,
        item: &str,
    ) -> Result<InventoryEntry, LedgerError> {
        let entry = self
            .retry
            .run(ctx, "purchase", |_| self.try_purchase(account_id, item))
            .await?;

        info!(%entry, "purchase committed");
        Ok(entry)
    }

    async fn try_transfer(
        &self,
        sender: AccountId,
        receiver_name: &AccountName,
        amount: PositiveAmount,
    ) -> Result<TransferRecord, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let mut sender_balance = store::read_balance(&mut tx, sender).await?;
        account::debit(&mut sender_balance, amount)?;

        let receiver = store::resolve_id_by_name(&mut tx, receiver_name).await?;
        if receiver == sender {
            return Err(LedgerError::SelfTransfer { account: sender });
        }
        let mut receiver_balance = store::read_balance(&mut tx, receiver).await?;
        account::credit(&mut receiver_balance, amount)?;

        store::write_balance(&mut tx, &sender_balance).await?;
        store::write_balance(&mut tx, &receiver_balance).await?;
        let record = record::append(&mut tx, sender, receiver, amount).await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn try_purchase(&self, account_id: AccountId, item: &str) -> Result<InventoryEntry, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let mut balance = store::read_balance(&mut tx, account_id).await?;
        let item = merch::find_item(&mut tx, item).await?;

        // Free items skip the debit but still land in the inventory.
        if let Ok(price) = PositiveAmount::try_from(item.price) {
            account::debit(&mut balance, price)?;
            store::write_balance(&mut tx, &balance).await?;
        }
        let entry = merch::add_to_inventory(&mut tx, account_id, &item).await?;

        tx.commit().await?;
        Ok(entry)
    }
}
