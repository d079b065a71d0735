//! Capacity-bounded in-memory cache.
//!
//! Provides [`LfuCache`], a key/value store holding at most `capacity` entries that evicts the
//! least-frequently-used entry when a new key has to be admitted. It is used to shadow account
//! summaries and is never authoritative.

mod lfu;

pub use lfu::LfuCache;
