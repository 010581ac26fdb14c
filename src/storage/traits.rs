// src/storage/traits.rs
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Account, AccountPatch, Iban};

/// Errors reported by a store adapter. Absence is not an error.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store is not connected")]
    NotConnected,

    #[error("account {0} already exists")]
    DuplicateKey(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Account persistence contract.
///
/// Implemented by the store adapters and by every cache strategy wrapping
/// them, so callers never know whether a cache is in front of the store.
/// No retries happen at this layer.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert(&self, account: &Account) -> StoreResult<Account>;

    async fn find(&self, iban: &Iban) -> StoreResult<Option<Account>>;

    /// Returns `true` when a record was removed.
    async fn delete(&self, iban: &Iban) -> StoreResult<bool>;

    async fn update_fields(&self, iban: &Iban, patch: &AccountPatch)
        -> StoreResult<Option<Account>>;

    async fn set_blocked(&self, iban: &Iban, blocked: bool) -> StoreResult<Option<Account>>;

    /// Set semantics: adding a card already present is a no-op.
    async fn add_card(&self, iban: &Iban, pan: &str) -> StoreResult<Option<Account>>;

    /// Returns `true` when the card was present and removed.
    async fn remove_card(&self, iban: &Iban, pan: &str) -> StoreResult<bool>;
}
