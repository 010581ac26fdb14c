// src/storage/mod.rs
pub mod mock;
pub mod postgres;
pub mod traits;

pub use mock::MockAccountStore;
pub use postgres::{PoolSettings, PostgresAccountStore};
pub use traits::{AccountStore, StoreError, StoreResult};
