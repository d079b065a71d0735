pub mod account;
pub mod amount;
pub mod cache;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod merch;
pub mod service;
pub mod storage;
pub mod summary;
