use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

use crate::monitor::ManagedConnection;

use super::client::{CacheClient, CacheError};

/// Redis-backed distributed cache.
///
/// Holds one multiplexed connection manager shared by every request. The
/// connection monitor replaces it on reconnect.
pub struct RedisCache {
    url: String,
    conn: RwLock<Option<ConnectionManager>>,
}

impl RedisCache {
    /// Create a disconnected cache client for the given `redis://` URL.
    pub fn new(url: impl Into<String>) -> Self {
        RedisCache {
            url: url.into(),
            conn: RwLock::new(None),
        }
    }

    fn connection(&self) -> Result<ConnectionManager, CacheError> {
        self.conn.read().clone().ok_or(CacheError::NotConnected)
    }
}

#[async_trait]
impl CacheClient for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection()?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        let _: i64 = conn.del(key).await?;
        Ok(())
    }
}

#[async_trait]
impl ManagedConnection for RedisCache {
    fn name(&self) -> &str {
        "cache"
    }

    fn has_handle(&self) -> bool {
        self.conn.read().is_some()
    }

    async fn connect(&self) -> anyhow::Result<()> {
        let client = redis::Client::open(self.url.as_str())?;
        let mut manager = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut manager).await?;

        *self.conn.write() = Some(manager);
        info!("Cache connected");
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.connection()?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) {
        if self.conn.write().take().is_some() {
            info!("Cache connection released");
        }
    }
}
