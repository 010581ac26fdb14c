pub mod account;
pub mod iban;
pub mod validation;

pub use account::{
    Account, AccountPatch, CardRef, CardSet, SubscriptionTier, PREMIUM_PERIOD_DAYS,
};
pub use iban::{Iban, IbanError};
pub use validation::is_valid_email;
