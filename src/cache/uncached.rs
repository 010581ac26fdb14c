use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{Account, AccountPatch, Iban};
use crate::storage::{AccountStore, StoreResult};

/// Pass-through strategy used when no cache is reachable or caching is off.
pub struct UncachedStore {
    store: Arc<dyn AccountStore>,
}

impl UncachedStore {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        UncachedStore { store }
    }
}

#[async_trait]
impl AccountStore for UncachedStore {
    async fn insert(&self, account: &Account) -> StoreResult<Account> {
        self.store.insert(account).await
    }

    async fn find(&self, iban: &Iban) -> StoreResult<Option<Account>> {
        self.store.find(iban).await
    }

    async fn delete(&self, iban: &Iban) -> StoreResult<bool> {
        self.store.delete(iban).await
    }

    async fn update_fields(
        &self,
        iban: &Iban,
        patch: &AccountPatch,
    ) -> StoreResult<Option<Account>> {
        self.store.update_fields(iban, patch).await
    }

    async fn set_blocked(&self, iban: &Iban, blocked: bool) -> StoreResult<Option<Account>> {
        self.store.set_blocked(iban, blocked).await
    }

    async fn add_card(&self, iban: &Iban, pan: &str) -> StoreResult<Option<Account>> {
        self.store.add_card(iban, pan).await
    }

    async fn remove_card(&self, iban: &Iban, pan: &str) -> StoreResult<bool> {
        self.store.remove_card(iban, pan).await
    }
}
