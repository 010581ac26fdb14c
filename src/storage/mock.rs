// src/storage/mock.rs
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::domain::{Account, AccountPatch, Iban};

use super::traits::{AccountStore, StoreError, StoreResult};

/// In-memory store adapter for tests and benches.
///
/// Counts every call so cache tests can assert when the store was touched,
/// and can be switched into a failing mode to simulate an outage.
#[derive(Debug, Default)]
pub struct MockAccountStore {
    accounts: Mutex<HashMap<String, Account>>,
    find_calls: AtomicUsize,
    write_calls: AtomicUsize,
    failing: AtomicBool,
    collisions: AtomicUsize,
}

impl MockAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account directly, bypassing call counters.
    pub fn seed(&self, account: Account) {
        self.accounts
            .lock()
            .insert(account.iban.as_str().to_string(), account);
    }

    /// Read an account directly, bypassing call counters.
    pub fn peek(&self, iban: &Iban) -> Option<Account> {
        self.accounts.lock().get(iban.as_str()).cloned()
    }

    /// Make every subsequent call fail with `NotConnected`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make the next `count` inserts fail with `DuplicateKey`, as if the
    /// generated identifier was already taken.
    pub fn collide_next_inserts(&self, count: usize) {
        self.collisions.store(count, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.lock().is_empty()
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::NotConnected)
        } else {
            Ok(())
        }
    }

    fn write<T>(&self, iban: &Iban, f: impl FnOnce(&mut Account) -> T) -> StoreResult<Option<T>> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.accounts.lock().get_mut(iban.as_str()).map(f))
    }
}

#[async_trait]
impl AccountStore for MockAccountStore {
    async fn insert(&self, account: &Account) -> StoreResult<Account> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;

        let key = account.iban.as_str().to_string();
        let collided = self
            .collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if collided {
            return Err(StoreError::DuplicateKey(key));
        }

        let mut accounts = self.accounts.lock();
        if accounts.contains_key(&key) {
            return Err(StoreError::DuplicateKey(key));
        }
        accounts.insert(key, account.clone());
        Ok(account.clone())
    }

    async fn find(&self, iban: &Iban) -> StoreResult<Option<Account>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.accounts.lock().get(iban.as_str()).cloned())
    }

    async fn delete(&self, iban: &Iban) -> StoreResult<bool> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.accounts.lock().remove(iban.as_str()).is_some())
    }

    async fn update_fields(
        &self,
        iban: &Iban,
        patch: &AccountPatch,
    ) -> StoreResult<Option<Account>> {
        self.write(iban, |account| {
            account.apply(patch);
            account.clone()
        })
    }

    async fn set_blocked(&self, iban: &Iban, blocked: bool) -> StoreResult<Option<Account>> {
        self.write(iban, |account| {
            account.is_blocked = blocked;
            account.clone()
        })
    }

    async fn add_card(&self, iban: &Iban, pan: &str) -> StoreResult<Option<Account>> {
        self.write(iban, |account| {
            if !account.has_card(pan) {
                account.cards.push(pan.to_string());
            }
            account.clone()
        })
    }

    async fn remove_card(&self, iban: &Iban, pan: &str) -> StoreResult<bool> {
        let removed = self.write(iban, |account| {
            let before = account.cards.len();
            account.cards.retain(|c| c != pan);
            account.cards.len() != before
        })?;
        Ok(removed.unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubscriptionTier;

    fn account() -> Account {
        Account::open(Iban::random_es(), "Test User", "test@example.com", SubscriptionTier::Free)
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MockAccountStore::new();
        let account = account();

        store.insert(&account).await.unwrap();
        let found = store.find(&account.iban).await.unwrap().unwrap();

        assert_eq!(found, account);
        assert_eq!(store.find_calls(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = MockAccountStore::new();
        let account = account();

        store.insert(&account).await.unwrap();
        let err = store.insert(&account).await.unwrap_err();

        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_card_set_semantics() {
        let store = MockAccountStore::new();
        let account = account();
        store.seed(account.clone());

        store.add_card(&account.iban, "4111").await.unwrap();
        let updated = store.add_card(&account.iban, "4111").await.unwrap().unwrap();
        assert_eq!(updated.cards.len(), 1);

        assert!(store.remove_card(&account.iban, "4111").await.unwrap());
        assert!(!store.remove_card(&account.iban, "4111").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_account_is_absent_not_error() {
        let store = MockAccountStore::new();
        let iban = Iban::random_es();

        assert!(store.set_blocked(&iban, true).await.unwrap().is_none());
        assert!(!store.delete(&iban).await.unwrap());
        assert!(!store.remove_card(&iban, "4111").await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_mode() {
        let store = MockAccountStore::new();
        store.set_failing(true);

        let err = store.find(&Iban::random_es()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotConnected));
    }
}
