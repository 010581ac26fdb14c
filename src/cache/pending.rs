use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{Account, AccountPatch, Iban};
use crate::storage::{AccountStore, StoreResult};

/// Accounts whose distributed cache entry may be stale.
///
/// An iban lands here when it was mutated while the distributed strategy
/// was not serving, or when deleting its key failed after a write. The
/// distributed strategy must delete the key before it trusts a hit again.
#[derive(Debug)]
pub struct PendingInvalidations {
    ibans: DashSet<String, ahash::RandomState>,
}

impl PendingInvalidations {
    pub fn new() -> Self {
        PendingInvalidations {
            ibans: DashSet::with_hasher(ahash::RandomState::new()),
        }
    }

    pub fn mark(&self, iban: &Iban) {
        if self.ibans.insert(iban.as_str().to_string()) {
            debug!(iban = %iban, "Distributed cache entry marked stale");
        }
    }

    pub fn contains(&self, iban: &Iban) -> bool {
        self.ibans.contains(iban.as_str())
    }

    /// Forget an iban once its key was deleted.
    pub fn resolve(&self, iban: &Iban) {
        self.ibans.remove(iban.as_str());
    }

    pub fn len(&self) -> usize {
        self.ibans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ibans.is_empty()
    }
}

impl Default for PendingInvalidations {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a non-distributed strategy and records every successful mutation
/// so the distributed cache drops its copy once it serves again.
pub struct PendingTracker {
    store: Arc<dyn AccountStore>,
    pending: Arc<PendingInvalidations>,
}

impl PendingTracker {
    pub fn new(store: Arc<dyn AccountStore>, pending: Arc<PendingInvalidations>) -> Self {
        PendingTracker { store, pending }
    }

    fn track<T>(&self, iban: &Iban, result: StoreResult<T>) -> StoreResult<T> {
        if result.is_ok() {
            self.pending.mark(iban);
        }
        result
    }
}

#[async_trait]
impl AccountStore for PendingTracker {
    async fn insert(&self, account: &Account) -> StoreResult<Account> {
        self.store.insert(account).await
    }

    async fn find(&self, iban: &Iban) -> StoreResult<Option<Account>> {
        self.store.find(iban).await
    }

    async fn delete(&self, iban: &Iban) -> StoreResult<bool> {
        let result = self.store.delete(iban).await;
        self.track(iban, result)
    }

    async fn update_fields(
        &self,
        iban: &Iban,
        patch: &AccountPatch,
    ) -> StoreResult<Option<Account>> {
        let result = self.store.update_fields(iban, patch).await;
        self.track(iban, result)
    }

    async fn set_blocked(&self, iban: &Iban, blocked: bool) -> StoreResult<Option<Account>> {
        let result = self.store.set_blocked(iban, blocked).await;
        self.track(iban, result)
    }

    async fn add_card(&self, iban: &Iban, pan: &str) -> StoreResult<Option<Account>> {
        let result = self.store.add_card(iban, pan).await;
        self.track(iban, result)
    }

    async fn remove_card(&self, iban: &Iban, pan: &str) -> StoreResult<bool> {
        let result = self.store.remove_card(iban, pan).await;
        self.track(iban, result)
    }
}
