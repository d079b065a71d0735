//! Ledger engine.
//!
//! Provides [`LedgerEngine`] which moves coins between accounts and sells merchandise inside
//! serializable transactions, retrying the whole operation when the backing store aborts it
//! because of a concurrent writer. [`retry`] holds the bounded retry state machine and [`record`]
//! the append-only transfer log.

pub mod engine;
pub mod record;
pub mod retry;

pub use engine::LedgerEngine;
pub use record::TransferRecord;
pub use retry::RetryPolicy;
