use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Reads served from a cache
    pub cache_hits: AtomicU64,
    /// Reads that went to the store and populated the cache
    pub cache_misses: AtomicU64,
    /// Cache errors absorbed by falling back to the store
    pub cache_fallbacks: AtomicU64,
    /// Keys evicted after a mutation
    pub cache_invalidations: AtomicU64,

    /// Calls short-circuited by an open breaker
    pub breaker_rejections: AtomicU64,
    /// Dependency calls that failed (status, transport, unexpected)
    pub dependency_failures: AtomicU64,

    /// Successful reconnections made by the connection monitor
    pub store_reconnects: AtomicU64,
    pub cache_reconnects: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_fallback(&self) {
        self.cache_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_invalidation(&self) {
        self.cache_invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_breaker_rejection(&self) {
        self.breaker_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dependency_failure(&self) {
        self.dependency_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_reconnect(&self) {
        self.store_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_reconnect(&self) {
        self.cache_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        format!(
            r#"# HELP accounts_cache_hits_total Account reads served from cache
# TYPE accounts_cache_hits_total counter
accounts_cache_hits_total {}

# HELP accounts_cache_misses_total Account reads that populated the cache
# TYPE accounts_cache_misses_total counter
accounts_cache_misses_total {}

# HELP accounts_cache_fallbacks_total Cache errors absorbed by reading the store
# TYPE accounts_cache_fallbacks_total counter
accounts_cache_fallbacks_total {}

# HELP accounts_cache_invalidations_total Cache keys evicted after mutations
# TYPE accounts_cache_invalidations_total counter
accounts_cache_invalidations_total {}

# HELP accounts_breaker_rejections_total Calls short-circuited by an open breaker
# TYPE accounts_breaker_rejections_total counter
accounts_breaker_rejections_total {}

# HELP accounts_dependency_failures_total Failed calls to dependent services
# TYPE accounts_dependency_failures_total counter
accounts_dependency_failures_total {}

# HELP accounts_reconnects_total Reconnections made by the connection monitor
# TYPE accounts_reconnects_total counter
accounts_reconnects_total{{resource="database"}} {}
accounts_reconnects_total{{resource="cache"}} {}
"#,
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
            self.cache_fallbacks.load(Ordering::Relaxed),
            self.cache_invalidations.load(Ordering::Relaxed),
            self.breaker_rejections.load(Ordering::Relaxed),
            self.dependency_failures.load(Ordering::Relaxed),
            self.store_reconnects.load(Ordering::Relaxed),
            self.cache_reconnects.load(Ordering::Relaxed),
        )
    }
}
