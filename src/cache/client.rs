use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a cache backend.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache is not connected")]
    NotConnected,

    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),
}

/// Opaque key/value service with per-key expiry.
///
/// Values are serialized snapshots; the backend never interprets them.
#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
