//! Read-through account caching in front of the store.
//!
//! Three interchangeable strategies implement [`AccountStore`]: no cache, a
//! process-local map and the distributed key/value service. The
//! [`RepositorySelector`] picks one per request from the configured mode and
//! the current availability of the cache.
//!
//! [`AccountStore`]: crate::storage::AccountStore

pub mod client;
pub mod distributed;
pub mod local;
pub mod mock;
pub mod pending;
pub mod redis;
pub mod selector;
pub mod uncached;

pub use client::{CacheClient, CacheError};
pub use distributed::DistributedCachedStore;
pub use local::{LocalCache, LocalCachedStore};
pub use mock::MockCacheClient;
pub use pending::{PendingInvalidations, PendingTracker};
pub use self::redis::RedisCache;
pub use selector::{CacheStrategy, RepositorySelector};
pub use uncached::UncachedStore;

use crate::domain::Iban;

/// Key under which an account snapshot is cached.
pub fn cache_key(iban: &Iban) -> String {
    format!("account:{iban}")
}
