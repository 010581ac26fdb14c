use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::domain::{Account, AccountPatch, Iban};
use crate::observability::MetricsRegistry;
use crate::storage::{AccountStore, StoreResult};

/// Process-local account cache.
///
/// Unbounded, no expiry. Entries live until invalidated or the map is
/// cleared. Every invalidation bumps a generation counter so a reader that
/// fetched from the store before a concurrent write cannot repopulate the
/// map with the pre-write snapshot.
#[derive(Debug)]
pub struct LocalCache {
    entries: DashMap<String, Account, ahash::RandomState>,
    generation: AtomicU64,
}

impl LocalCache {
    pub fn new() -> Self {
        LocalCache {
            entries: DashMap::with_hasher(ahash::RandomState::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn get(&self, iban: &Iban) -> Option<Account> {
        self.entries.get(iban.as_str()).map(|e| e.value().clone())
    }

    /// Token to pass to `populate` after reading the store.
    pub fn read_token(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Insert a snapshot read from the store, unless an invalidation ran
    /// since `token` was taken. Returns whether the entry was kept.
    pub fn populate(&self, token: u64, account: Account) -> bool {
        let key = account.iban.as_str().to_string();
        self.entries.insert(key.clone(), account);

        // Re-check after inserting: an invalidation landing in between
        // would otherwise be lost.
        if self.generation.load(Ordering::Acquire) != token {
            self.entries.remove(&key);
            return false;
        }
        true
    }

    pub fn invalidate(&self, iban: &Iban) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.remove(iban.as_str());
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache strategy backed by the process-local map.
///
/// Reads check the map first. Writes go to the store, then evict the key
/// once the store call succeeded.
pub struct LocalCachedStore {
    store: Arc<dyn AccountStore>,
    cache: Arc<LocalCache>,
    metrics: Arc<MetricsRegistry>,
}

impl LocalCachedStore {
    pub fn new(
        store: Arc<dyn AccountStore>,
        cache: Arc<LocalCache>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        LocalCachedStore {
            store,
            cache,
            metrics,
        }
    }

    fn evict<T>(&self, iban: &Iban, result: StoreResult<T>) -> StoreResult<T> {
        if result.is_ok() {
            self.cache.invalidate(iban);
            self.metrics.record_cache_invalidation();
            debug!(iban = %iban, "Local cache entry invalidated");
        }
        result
    }
}

#[async_trait]
impl AccountStore for LocalCachedStore {
    async fn insert(&self, account: &Account) -> StoreResult<Account> {
        self.store.insert(account).await
    }

    async fn find(&self, iban: &Iban) -> StoreResult<Option<Account>> {
        if let Some(account) = self.cache.get(iban) {
            self.metrics.record_cache_hit();
            debug!(iban = %iban, "Local cache HIT");
            return Ok(Some(account));
        }

        let token = self.cache.read_token();
        let found = self.store.find(iban).await?;
        if let Some(account) = &found {
            self.metrics.record_cache_miss();
            if self.cache.populate(token, account.clone()) {
                debug!(iban = %iban, "Local cache MISS: account cached");
            } else {
                debug!(iban = %iban, "Local cache MISS: concurrent write, not cached");
            }
        }
        Ok(found)
    }

    async fn delete(&self, iban: &Iban) -> StoreResult<bool> {
        let result = self.store.delete(iban).await;
        self.evict(iban, result)
    }

    async fn update_fields(
        &self,
        iban: &Iban,
        patch: &AccountPatch,
    ) -> StoreResult<Option<Account>> {
        let result = self.store.update_fields(iban, patch).await;
        self.evict(iban, result)
    }

    async fn set_blocked(&self, iban: &Iban, blocked: bool) -> StoreResult<Option<Account>> {
        let result = self.store.set_blocked(iban, blocked).await;
        self.evict(iban, result)
    }

    async fn add_card(&self, iban: &Iban, pan: &str) -> StoreResult<Option<Account>> {
        let result = self.store.add_card(iban, pan).await;
        self.evict(iban, result)
    }

    async fn remove_card(&self, iban: &Iban, pan: &str) -> StoreResult<bool> {
        let result = self.store.remove_card(iban, pan).await;
        self.evict(iban, result)
    }
}
