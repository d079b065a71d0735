//! Operations exposed to request handlers.
//!
//! [`CoinService`] wires the account store, the ledger engine, the summary cache and the cache
//! coordinator together. Writes go to the ledger and invalidate the affected summaries once
//! committed; summary reads probe the cache first and repopulate it on a miss.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::account::Account;
use crate::account::AccountId;
use crate::account::AccountName;
use crate::account::AccountStore;
use crate::config::Config;
use crate::context::Context;
use crate::coordinator::CacheCoordinator;
use crate::coordinator::SummaryCache;
use crate::error::LedgerError;
use crate::ledger::LedgerEngine;
use crate::ledger::RetryPolicy;
use crate::ledger::TransferRecord;
use crate::merch::InventoryEntry;
use crate::storage;
use crate::summary;
use crate::summary::AccountSummary;

#[derive(Clone)]
pub struct CoinService {
    pool: SqlitePool,
    accounts: AccountStore,
    ledger: LedgerEngine,
    cache: Arc<SummaryCache>,
    coordinator: CacheCoordinator,
    starting_balance: i64,
}

impl CoinService {
    pub fn new(pool: SqlitePool, cache: Arc<SummaryCache>, retry: RetryPolicy, starting_balance: i64) -> Self {
        Self {
            accounts: AccountStore::new(pool.clone()),
            ledger: LedgerEngine::new(pool.clone(), retry),
            coordinator: CacheCoordinator::new(Arc::clone(&cache)),
            pool,
            cache,
            starting_balance,
        }
    }

    pub fn from_config(pool: SqlitePool, config: &Config) -> Self {
        Self::new(
            pool,
            Arc::new(SummaryCache::new(config.cache_capacity)),
            config.retry_policy(),
            config.starting_balance,
        )
    }

    pub fn cache(&self) -> &SummaryCache {
        &self.cache
    }

    /// Returns the account called `name`, creating it with the starting grant on first sight.
    ///
    /// `credential` is stored opaquely on creation; verifying it against an existing account is
    /// the caller's business.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or `ctx` is cancelled or times out.
    #[tracing::instrument(skip(self, ctx, credential), err(Display))]
    pub async fn get_or_create_account(
        &self,
        ctx: &Context,
        name: &str,
        credential: &str,
    ) -> Result<Account, LedgerError> {
        let name = AccountName::normalize(name);
        match self.accounts.find_account_by_name(ctx, &name).await {
            Ok(account) => return Ok(account),
            Err(LedgerError::NotFound { .. }) => {}
            Err(error) => return Err(error),
        }

        let account = Account::new(name.clone(), credential.to_owned(), self.starting_balance);
        match self.accounts.create_account(ctx, &account).await {
            Ok(()) => {
                info!(account = %account.id(), created_at = %account.created_at(), "account created");
                Ok(account)
            }
            // Lost a creation race against a concurrent first login.
            Err(LedgerError::Internal(error)) if storage::is_unique_violation(&error) => {
                self.accounts.find_account_by_name(ctx, &name).await
            }
            Err(error) => Err(error),
        }
    }

    /// # Errors
    ///
    /// See [`AccountStore::find_account_by_name`].
    pub async fn find_account_by_name(&self, ctx: &Context, name: &str) -> Result<Account, LedgerError> {
        self.accounts
            .find_account_by_name(ctx, &AccountName::normalize(name))
            .await
    }

    /// # Errors
    ///
    /// See [`AccountStore::resolve_id_by_name`].
    pub async fn resolve_id_by_name(&self, ctx: &Context, name: &str) -> Result<AccountId, LedgerError> {
        self.accounts
            .resolve_id_by_name(ctx, &AccountName::normalize(name))
            .await
    }

    /// # Errors
    ///
    /// See [`AccountStore::create_account`].
    pub async fn create_account(&self, ctx: &Context, account: &Account) -> Result<(), LedgerError> {
        self.accounts.create_account(ctx, account).await
    }

    /// Summary of `account_id`, served from the cache when possible.
    ///
    /// A cached entry that fails to decode is dropped and read again from the store. A summary
    /// that fails to encode is returned without being cached, and so is one whose store read was
    /// overtaken by an invalidation: it may predate the write that triggered it.
    ///
    /// # Errors
    ///
    /// See [`summary::read_summary`]. Cache hits never error.
    #[tracing::instrument(skip(self, ctx), err(Display))]
    pub async fn summary(&self, ctx: &Context, account_id: AccountId) -> Result<AccountSummary, LedgerError> {
        if let Some(cached) = self.cache.get(&account_id) {
            match serde_json::from_str::<AccountSummary>(&cached) {
                Ok(summary) => return Ok(summary),
                Err(error) => {
                    warn!(%error, "undecodable cached summary, reading store");
                    self.cache.delete(&account_id);
                }
            }
        }

        let generation = self.cache.generation();
        let summary = summary::read_summary(ctx, &self.pool, account_id).await?;
        self.populate(account_id, &summary, generation);
        Ok(summary)
    }

    /// Caches `summary` unless the cache was invalidated after `generation` was read.
    fn populate(&self, account_id: AccountId, summary: &AccountSummary, generation: u64) {
        let encoded = match serde_json::to_string(summary) {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(%error, "summary not cached");
                return;
            }
        };
        if !self.cache.set_if_unchanged(account_id, encoded, generation) {
            debug!("summary read overtaken by invalidation, not cached");
        }
    }

    /// Transfers coins and invalidates the summaries of both parties once committed.
    ///
    /// # Errors
    ///
    /// See [`LedgerEngine::transfer`].
    pub async fn transfer(
        &self,
        ctx: &Context,
        sender: AccountId,
        receiver_name: &str,
        amount: i64,
    ) -> Result<TransferRecord, LedgerError> {
        let record = self.ledger.transfer(ctx, sender, receiver_name, amount).await?;
        self.coordinator.after_transfer(&record.sender, Some(&record.receiver));
        Ok(record)
    }

    /// Sells one `item` and invalidates the buyer summary once committed.
    ///
    /// # Errors
    ///
    /// See [`LedgerEngine::purchase`].
    pub async fn purchase(
        &self,
        ctx: &Context,
        account_id: AccountId,
        item: &str,
    ) -> Result<InventoryEntry, LedgerError> {
        let entry = self.ledger.purchase(ctx, account_id, item).await?;
        self.coordinator.after_purchase(&account_id);
        Ok(entry)
    }
}
