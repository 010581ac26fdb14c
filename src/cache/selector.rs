use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::CacheMode;
use crate::monitor::Availability;
use crate::observability::MetricsRegistry;
use crate::storage::AccountStore;

use super::client::CacheClient;
use super::distributed::DistributedCachedStore;
use super::local::{LocalCache, LocalCachedStore};
use super::pending::{PendingInvalidations, PendingTracker};
use super::uncached::UncachedStore;

/// Cache strategy serving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CacheStrategy {
    Uncached = 0,
    Local = 1,
    Distributed = 2,
}

impl CacheStrategy {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CacheStrategy::Local,
            2 => CacheStrategy::Distributed,
            _ => CacheStrategy::Uncached,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::Uncached => "none",
            CacheStrategy::Local => "local",
            CacheStrategy::Distributed => "distributed",
        }
    }
}

/// Chooses the cache strategy for each request.
///
/// All strategies share the same store adapter and the same local map, so
/// switching between them is cheap. The local map is cleared whenever the
/// selector switches into local mode: writes made while another strategy
/// was active never invalidated it. In the other direction, mutations made
/// while the distributed strategy is not serving are recorded as pending
/// invalidations, and the distributed strategy deletes those keys before
/// trusting them again.
pub struct RepositorySelector {
    store: Arc<dyn AccountStore>,
    local: Arc<LocalCache>,
    pending: Arc<PendingInvalidations>,
    client: Option<Arc<dyn CacheClient>>,
    availability: Arc<Availability>,
    metrics: Arc<MetricsRegistry>,
    mode: CacheMode,
    ttl: Duration,
    last: AtomicU8,
}

impl RepositorySelector {
    pub fn new(
        store: Arc<dyn AccountStore>,
        client: Option<Arc<dyn CacheClient>>,
        availability: Arc<Availability>,
        metrics: Arc<MetricsRegistry>,
        mode: CacheMode,
        ttl: Duration,
    ) -> Self {
        RepositorySelector {
            store,
            local: Arc::new(LocalCache::new()),
            pending: Arc::new(PendingInvalidations::new()),
            client,
            availability,
            metrics,
            mode,
            ttl,
            last: AtomicU8::new(CacheStrategy::Uncached as u8),
        }
    }

    /// Strategy the next request would use.
    pub fn strategy(&self) -> CacheStrategy {
        let distributed = self.client.is_some() && self.availability.cache_available();
        match self.mode {
            CacheMode::None => CacheStrategy::Uncached,
            CacheMode::Local => CacheStrategy::Local,
            CacheMode::Distributed if distributed => CacheStrategy::Distributed,
            CacheMode::Distributed => CacheStrategy::Uncached,
            CacheMode::Auto if distributed => CacheStrategy::Distributed,
            CacheMode::Auto => CacheStrategy::Local,
        }
    }

    /// Store handle for one request, wrapped in the current strategy.
    pub fn resolve(&self) -> Arc<dyn AccountStore> {
        let strategy = self.strategy();
        let previous = CacheStrategy::from_u8(self.last.swap(strategy as u8, Ordering::AcqRel));

        if previous != strategy {
            if strategy == CacheStrategy::Local {
                self.local.clear();
            }
            info!(
                from = previous.as_str(),
                to = strategy.as_str(),
                "Cache strategy switched"
            );
        }

        let resolved: Arc<dyn AccountStore> = match (strategy, &self.client) {
            (CacheStrategy::Distributed, Some(client)) => {
                return Arc::new(
                    DistributedCachedStore::new(
                        self.store.clone(),
                        client.clone(),
                        self.ttl,
                        self.metrics.clone(),
                    )
                    .with_pending(self.pending.clone()),
                );
            }
            (CacheStrategy::Local, _) => Arc::new(LocalCachedStore::new(
                self.store.clone(),
                self.local.clone(),
                self.metrics.clone(),
            )),
            _ => Arc::new(UncachedStore::new(self.store.clone())),
        };

        // No distributed cache configured: nothing can go stale there.
        if self.client.is_none() {
            return resolved;
        }
        Arc::new(PendingTracker::new(resolved, self.pending.clone()))
    }

    pub fn local_cache(&self) -> &LocalCache {
        &self.local
    }

    pub fn pending_invalidations(&self) -> &PendingInvalidations {
        &self.pending
    }
}
