//! Persistent TTL cache for upstream API responses.
//!
//! Every entry lives in its own file under `<cache_dir>/entries/`, with a
//! validated binary header recording when it was written and how long it
//! stays fresh. The store is fail-safe: unreadable or corrupt entries are
//! reported as misses, never as errors to the caller of [`CacheStore::get`].

#![warn(missing_docs)]

pub mod entry;
pub mod error;
pub mod key;
pub mod store;

pub use error::CacheError;
pub use key::CacheKey;
pub use store::{CacheStats, CacheStore};
