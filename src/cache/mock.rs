use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use super::client::{CacheClient, CacheError};

/// In-memory cache backend for tests and benches.
///
/// Records the expiry requested for each key and can be taken down to
/// simulate an outage. Entries never actually expire.
#[derive(Debug, Default)]
pub struct MockCacheClient {
    entries: Mutex<HashMap<String, (String, Duration)>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
    deletes: AtomicUsize,
    down: AtomicBool,
}

impl MockCacheClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw value, bypassing counters. Used to plant corrupt entries.
    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), Duration::ZERO));
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).map(|(v, _)| v.clone())
    }

    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Make every subsequent call fail with `NotConnected`.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.down.load(Ordering::SeqCst) {
            Err(CacheError::NotConnected)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheClient for MockCacheClient {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}
