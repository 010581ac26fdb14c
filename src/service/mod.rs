pub mod accounts;
pub mod error;

pub use accounts::{AccountChanges, AccountService, NewAccount};
pub use error::{ServiceError, ServiceResult};
