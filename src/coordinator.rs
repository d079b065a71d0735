//! Keeps the summary cache consistent with ledger writes it did not perform.
//!
//! Invalidation runs right after a ledger commit. Between the commit and the invalidation a
//! cached read may still return the pre-commit summary; that window is bounded by this call and
//! the backing store stays authoritative throughout.

use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use crate::account::AccountId;
use crate::cache::LfuCache;

/// Cached account summaries, JSON-encoded and keyed by account id.
pub type SummaryCache = LfuCache<AccountId, String>;

#[derive(Clone)]
pub struct CacheCoordinator {
    cache: Arc<SummaryCache>,
}

impl CacheCoordinator {
    pub const fn new(cache: Arc<SummaryCache>) -> Self {
        Self { cache }
    }

    /// Drops the summaries of both sides of a committed transfer.
    ///
    /// When the receiver id could not be determined the whole cache is cleared rather than risk
    /// serving a stale receiver summary indefinitely.
    ///
    /// [`crate::service::CoinService`] always knows the receiver from the committed record. The
    /// `None` form is for callers driving [`crate::ledger::LedgerEngine`] directly that only hold
    /// the sender and a receiver name they failed to resolve after commit.
    pub fn after_transfer(&self, sender: &AccountId, receiver: Option<&AccountId>) {
        self.cache.delete(sender);
        match receiver {
            Some(receiver) => {
                self.cache.delete(receiver);
                debug!(%sender, %receiver, "invalidated transfer summaries");
            }
            None => {
                warn!(%sender, "transfer receiver unknown, clearing summary cache");
                self.cache.clear();
            }
        }
    }

    /// Drops the summary of the account that made a committed purchase.
    pub fn after_purchase(&self, account: &AccountId) {
        self.cache.delete(account);
        debug!(%account, "invalidated purchase summary");
    }
}
