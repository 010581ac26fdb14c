use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Connection state of a monitored resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResourceState {
    Disconnected = 0,
    Connected = 1,
    Reconnecting = 2,
}

impl From<u8> for ResourceState {
    fn from(value: u8) -> Self {
        match value {
            1 => ResourceState::Connected,
            2 => ResourceState::Reconnecting,
            _ => ResourceState::Disconnected,
        }
    }
}

/// Process-wide availability cell for the store and the cache.
///
/// Written only by the connection monitor, read by request handlers.
/// A `Connected` reading is advisory: the next call on the connection may
/// still fail, and callers handle that failure themselves.
#[derive(Debug)]
pub struct Availability {
    store: AtomicU8,
    cache: AtomicU8,
    ready: AtomicBool,
}

impl Availability {
    pub fn new() -> Self {
        Availability {
            store: AtomicU8::new(ResourceState::Disconnected as u8),
            cache: AtomicU8::new(ResourceState::Disconnected as u8),
            ready: AtomicBool::new(false),
        }
    }

    pub fn store_state(&self) -> ResourceState {
        ResourceState::from(self.store.load(Ordering::Acquire))
    }

    pub fn cache_state(&self) -> ResourceState {
        ResourceState::from(self.cache.load(Ordering::Acquire))
    }

    pub fn set_store_state(&self, state: ResourceState) {
        self.store.store(state as u8, Ordering::Release);
    }

    pub fn set_cache_state(&self, state: ResourceState) {
        self.cache.store(state as u8, Ordering::Release);
    }

    pub fn store_available(&self) -> bool {
        self.store_state() == ResourceState::Connected
    }

    pub fn cache_available(&self) -> bool {
        self.cache_state() == ResourceState::Connected
    }

    /// Startup finished; the service can report itself as up.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

impl Default for Availability {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let availability = Availability::new();

        assert_eq!(availability.store_state(), ResourceState::Disconnected);
        assert!(!availability.cache_available());
        assert!(!availability.is_ready());
    }

    #[test]
    fn test_only_connected_counts_as_available() {
        let availability = Availability::new();

        availability.set_cache_state(ResourceState::Reconnecting);
        assert!(!availability.cache_available());

        availability.set_cache_state(ResourceState::Connected);
        assert!(availability.cache_available());
        assert!(!availability.store_available());
    }
}
