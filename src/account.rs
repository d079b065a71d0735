//! Accounts and their balances.
//!
//! [`model`] holds the account data types, [`ops`] the balance arithmetic the ledger applies and
//! [`store`] the point reads and writes against the backing store.

pub mod model;
pub mod ops;
pub mod store;

pub use model::Account;
pub use model::AccountBalance;
pub use model::AccountId;
pub use model::AccountName;
pub use ops::BalanceError;
pub use ops::credit;
pub use ops::debit;
pub use store::AccountStore;
