use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::domain::{Account, AccountPatch, Iban};
use crate::observability::MetricsRegistry;
use crate::storage::{AccountStore, StoreResult};

use super::cache_key;
use super::client::CacheClient;
use super::pending::PendingInvalidations;

/// Cache strategy backed by the shared key/value service.
///
/// Cache errors never fail a request: reads fall back to the store and
/// failed writes to the cache are logged. Writes go to the store first and
/// the key is deleted once the store call succeeded. A key that could not
/// be deleted is remembered in the pending set and deleted before the next
/// read of that account trusts the cache.
pub struct DistributedCachedStore {
    store: Arc<dyn AccountStore>,
    client: Arc<dyn CacheClient>,
    ttl: Duration,
    metrics: Arc<MetricsRegistry>,
    pending: Arc<PendingInvalidations>,
}

impl DistributedCachedStore {
    pub fn new(
        store: Arc<dyn AccountStore>,
        client: Arc<dyn CacheClient>,
        ttl: Duration,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        DistributedCachedStore {
            store,
            client,
            ttl,
            metrics,
            pending: Arc::new(PendingInvalidations::new()),
        }
    }

    /// Share the pending set with the other strategies.
    pub fn with_pending(mut self, pending: Arc<PendingInvalidations>) -> Self {
        self.pending = pending;
        self
    }

    /// Delete a key marked stale. Returns whether the cache can be trusted
    /// for this account again.
    async fn flush_pending(&self, iban: &Iban, key: &str) -> bool {
        match self.client.delete(key).await {
            Ok(()) => {
                self.pending.resolve(iban);
                self.metrics.record_cache_invalidation();
                debug!(key, "Stale cache entry dropped");
                true
            }
            Err(e) => {
                warn!(key, error = %e, "Stale cache entry still present, bypassing cache");
                false
            }
        }
    }

    async fn cached(&self, key: &str) -> Option<Account> {
        match self.client.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Account>(&raw) {
                Ok(account) => Some(account),
                Err(e) => {
                    self.metrics.record_cache_fallback();
                    error!(key, error = %e, "Error deserializing cached account, reading store");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.metrics.record_cache_fallback();
                warn!(key, error = %e, "Cache read failed, reading store");
                None
            }
        }
    }

    async fn store_snapshot(&self, key: &str, account: &Account) {
        let raw = match serde_json::to_string(account) {
            Ok(raw) => raw,
            Err(e) => {
                error!(key, error = %e, "Failed to serialize account for cache");
                return;
            }
        };

        match self.client.set_ex(key, &raw, self.ttl).await {
            Ok(()) => info!(key, "Cache MISS: account cached"),
            Err(e) => warn!(key, error = %e, "Failed to cache account"),
        }
    }

    async fn evict<T>(&self, iban: &Iban, result: StoreResult<T>) -> StoreResult<T> {
        if result.is_ok() {
            let key = cache_key(iban);
            match self.client.delete(&key).await {
                Ok(()) => {
                    self.pending.resolve(iban);
                    self.metrics.record_cache_invalidation();
                    debug!(key, "Cache entry invalidated");
                }
                Err(e) => {
                    self.pending.mark(iban);
                    error!(key, error = %e, "Failed to invalidate cache entry after write");
                }
            }
        }
        result
    }
}

#[async_trait]
impl AccountStore for DistributedCachedStore {
    async fn insert(&self, account: &Account) -> StoreResult<Account> {
        self.store.insert(account).await
    }

    async fn find(&self, iban: &Iban) -> StoreResult<Option<Account>> {
        let key = cache_key(iban);
        if self.pending.contains(iban) && !self.flush_pending(iban, &key).await {
            self.metrics.record_cache_fallback();
            return self.store.find(iban).await;
        }

        if let Some(account) = self.cached(&key).await {
            self.metrics.record_cache_hit();
            info!(key, "Cache HIT");
            return Ok(Some(account));
        }

        let found = self.store.find(iban).await?;
        if let Some(account) = &found {
            self.metrics.record_cache_miss();
            self.store_snapshot(&key, account).await;
        }
        Ok(found)
    }

    async fn delete(&self, iban: &Iban) -> StoreResult<bool> {
        let result = self.store.delete(iban).await;
        self.evict(iban, result).await
    }

    async fn update_fields(
        &self,
        iban: &Iban,
        patch: &AccountPatch,
    ) -> StoreResult<Option<Account>> {
        let result = self.store.update_fields(iban, patch).await;
        self.evict(iban, result).await
    }

    async fn set_blocked(&self, iban: &Iban, blocked: bool) -> StoreResult<Option<Account>> {
        let result = self.store.set_blocked(iban, blocked).await;
        self.evict(iban, result).await
    }

    async fn add_card(&self, iban: &Iban, pan: &str) -> StoreResult<Option<Account>> {
        let result = self.store.add_card(iban, pan).await;
        self.evict(iban, result).await
    }

    async fn remove_card(&self, iban: &Iban, pan: &str) -> StoreResult<bool> {
        let result = self.store.remove_card(iban, pan).await;
        self.evict(iban, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MockCacheClient;
    use crate::domain::SubscriptionTier;
    use crate::storage::MockAccountStore;
    use rust_decimal::Decimal;
    use std::sync::atomic::Ordering;

    const TTL: Duration = Duration::from_secs(3600);

    struct Fixture {
        inner: Arc<MockAccountStore>,
        client: Arc<MockCacheClient>,
        metrics: Arc<MetricsRegistry>,
        store: DistributedCachedStore,
        account: Account,
    }

    fn fixture() -> Fixture {
        let inner = Arc::new(MockAccountStore::new());
        let client = Arc::new(MockCacheClient::new());
        let metrics = Arc::new(MetricsRegistry::new());
        let account = Account::open(
            Iban::random_es(),
            "Test User",
            "test@example.com",
            SubscriptionTier::Premium,
        );
        inner.seed(account.clone());
        let store =
            DistributedCachedStore::new(inner.clone(), client.clone(), TTL, metrics.clone());
        Fixture {
            inner,
            client,
            metrics,
            store,
            account,
        }
    }

    #[tokio::test]
    async fn test_miss_populates_with_ttl_then_hits() {
        let f = fixture();
        let key = cache_key(&f.account.iban);

        let first = f.store.find(&f.account.iban).await.unwrap().unwrap();
        assert_eq!(f.client.ttl_of(&key), Some(TTL));

        let second = f.store.find(&f.account.iban).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(second, f.account);
        assert_eq!(f.inner.find_calls(), 1);
        assert_eq!(f.metrics.cache_hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_update_then_read_sees_new_value() {
        let f = fixture();
        f.store.find(&f.account.iban).await.unwrap();

        f.store
            .update_fields(&f.account.iban, &AccountPatch::balance(Decimal::new(115000, 2)))
            .await
            .unwrap();

        assert!(!f.client.contains(&cache_key(&f.account.iban)));
        let read = f.store.find(&f.account.iban).await.unwrap().unwrap();
        assert_eq!(read.balance, Decimal::new(115000, 2));
    }

    #[tokio::test]
    async fn test_block_and_card_mutations_invalidate() {
        let f = fixture();
        let key = cache_key(&f.account.iban);

        f.store.find(&f.account.iban).await.unwrap();
        f.store.set_blocked(&f.account.iban, true).await.unwrap();
        assert!(!f.client.contains(&key));
        assert!(f.store.find(&f.account.iban).await.unwrap().unwrap().is_blocked);

        f.store.add_card(&f.account.iban, "4111").await.unwrap();
        assert!(!f.client.contains(&key));
        assert!(f.store.find(&f.account.iban).await.unwrap().unwrap().has_card("4111"));

        f.store.remove_card(&f.account.iban, "4111").await.unwrap();
        assert!(!f.store.find(&f.account.iban).await.unwrap().unwrap().has_card("4111"));
    }

    #[tokio::test]
    async fn test_delete_invalidates() {
        let f = fixture();
        f.store.find(&f.account.iban).await.unwrap();

        assert!(f.store.delete(&f.account.iban).await.unwrap());

        assert!(f.store.find(&f.account.iban).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_falls_back_to_store() {
        let f = fixture();
        let key = cache_key(&f.account.iban);
        f.client.put_raw(&key, "{not json");

        let read = f.store.find(&f.account.iban).await.unwrap().unwrap();

        assert_eq!(read, f.account);
        assert_eq!(f.inner.find_calls(), 1);
        assert_eq!(f.metrics.cache_fallbacks.load(Ordering::Relaxed), 1);
        // Repopulated with a valid snapshot.
        let raw = f.client.raw(&key).unwrap();
        assert!(serde_json::from_str::<Account>(&raw).is_ok());
    }

    #[tokio::test]
    async fn test_cache_outage_does_not_fail_requests() {
        let f = fixture();
        f.client.set_down(true);

        let read = f.store.find(&f.account.iban).await.unwrap();
        assert!(read.is_some());

        let blocked = f.store.set_blocked(&f.account.iban, true).await.unwrap();
        assert!(blocked.unwrap().is_blocked);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let f = fixture();
        let key = cache_key(&f.account.iban);
        f.store.find(&f.account.iban).await.unwrap();

        f.inner.set_failing(true);
        assert!(f.store.set_blocked(&f.account.iban, true).await.is_err());

        assert!(f.client.contains(&key));
        assert_eq!(f.client.deletes(), 0);
    }

    #[tokio::test]
    async fn test_failed_invalidation_is_retried_before_next_hit() {
        let f = fixture();
        let key = cache_key(&f.account.iban);
        f.store.find(&f.account.iban).await.unwrap();

        f.client.set_down(true);
        f.store.set_blocked(&f.account.iban, true).await.unwrap();
        f.client.set_down(false);
        assert!(f.client.contains(&key));

        let read = f.store.find(&f.account.iban).await.unwrap().unwrap();

        assert!(read.is_blocked);
        assert!(f.store.pending.is_empty());
    }

    #[tokio::test]
    async fn test_stale_key_is_bypassed_while_delete_keeps_failing() {
        let f = fixture();
        let key = cache_key(&f.account.iban);
        f.store.find(&f.account.iban).await.unwrap();
        f.store.pending.mark(&f.account.iban);
        f.inner.seed(Account {
            is_blocked: true,
            ..f.account.clone()
        });

        f.client.set_down(true);
        let read = f.store.find(&f.account.iban).await.unwrap().unwrap();

        assert!(read.is_blocked);
        assert!(f.store.pending.contains(&f.account.iban));
        f.client.set_down(false);
        assert!(f.client.contains(&key));
    }
}
