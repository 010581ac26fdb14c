use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::RepositorySelector;
use crate::domain::{is_valid_email, Account, AccountPatch, Iban, SubscriptionTier};
use crate::resilience::{CardIssuer, Conversion, CurrencyExchange};
use crate::storage::StoreError;

use super::error::{ServiceError, ServiceResult};

/// Identifier generation attempts before a duplicate key is reported.
const IBAN_ATTEMPTS: usize = 3;

/// Fields of a new account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    #[serde(default = "default_subscription")]
    pub subscription: String,
}

fn default_subscription() -> String {
    SubscriptionTier::Free.as_str().to_string()
}

/// Holder-editable fields. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subscription: Option<String>,
}

/// Account business rules on top of the cached store and the dependent
/// services.
///
/// Every operation resolves the cache strategy once and uses it for all of
/// its store calls.
pub struct AccountService {
    repositories: Arc<RepositorySelector>,
    cards: Arc<dyn CardIssuer>,
    currencies: Arc<dyn CurrencyExchange>,
    base_currency: String,
}

impl AccountService {
    pub fn new(
        repositories: Arc<RepositorySelector>,
        cards: Arc<dyn CardIssuer>,
        currencies: Arc<dyn CurrencyExchange>,
        base_currency: impl Into<String>,
    ) -> Self {
        AccountService {
            repositories,
            cards,
            currencies,
            base_currency: base_currency.into(),
        }
    }

    pub async fn create(&self, request: NewAccount) -> ServiceResult<Account> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation("name must not be empty".into()));
        }
        validate_email(&request.email)?;
        let tier = parse_tier(&request.subscription)?;

        let repo = self.repositories.resolve();
        let mut last_conflict = None;
        for attempt in 1..=IBAN_ATTEMPTS {
            let account = Account::open(Iban::random_es(), name, request.email.as_str(), tier);
            match repo.insert(&account).await {
                Ok(stored) => {
                    info!(iban = %stored.iban, "Account created");
                    return Ok(stored);
                }
                Err(StoreError::DuplicateKey(key)) => {
                    warn!(attempt, iban = %key, "Generated IBAN already taken, retrying");
                    last_conflict = Some(key);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::DuplicateKey(last_conflict.unwrap_or_default()).into())
    }

    pub async fn get(&self, iban: &str) -> ServiceResult<Account> {
        let iban = Iban::parse(iban)?;
        self.repositories
            .resolve()
            .find(&iban)
            .await?
            .ok_or(ServiceError::NotFound("account"))
    }

    pub async fn update(&self, iban: &str, changes: AccountChanges) -> ServiceResult<Account> {
        let iban = Iban::parse(iban)?;

        let mut patch = AccountPatch::default();
        if let Some(name) = changes.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ServiceError::Validation("name must not be empty".into()));
            }
            patch.name = Some(name.to_string());
        }
        if let Some(email) = changes.email {
            validate_email(&email)?;
            patch.email = Some(email);
        }
        if let Some(subscription) = changes.subscription {
            let tier = parse_tier(&subscription)?;
            patch.subscription = Some(tier);
            patch.subscription_expires_at = Some(tier.expiry_from(Utc::now()));
        }

        let repo = self.repositories.resolve();
        let updated = if patch.is_empty() {
            repo.find(&iban).await?
        } else {
            repo.update_fields(&iban, &patch).await?
        };
        updated.ok_or(ServiceError::NotFound("account"))
    }

    /// Credit (positive) or debit (negative) the balance.
    ///
    /// A result below zero is rejected and nothing is written.
    pub async fn adjust_balance(&self, iban: &str, delta: Decimal) -> ServiceResult<Account> {
        let iban = Iban::parse(iban)?;
        let repo = self.repositories.resolve();

        let account = repo
            .find(&iban)
            .await?
            .ok_or(ServiceError::NotFound("account"))?;

        let balance = (account.balance + delta).round_dp(2);
        if balance < Decimal::ZERO {
            warn!(iban = %iban, %delta, "Balance operation rejected: insufficient funds");
            return Err(ServiceError::Forbidden("insufficient funds".into()));
        }

        repo.update_fields(&iban, &AccountPatch::balance(balance))
            .await?
            .ok_or(ServiceError::NotFound("account"))
    }

    pub async fn delete(&self, iban: &str) -> ServiceResult<()> {
        let iban = Iban::parse(iban)?;
        if self.repositories.resolve().delete(&iban).await? {
            info!(iban = %iban, "Account deleted");
            Ok(())
        } else {
            Err(ServiceError::NotFound("account"))
        }
    }

    pub async fn block(&self, iban: &str) -> ServiceResult<()> {
        self.set_blocked(iban, true).await
    }

    pub async fn unblock(&self, iban: &str) -> ServiceResult<()> {
        self.set_blocked(iban, false).await
    }

    async fn set_blocked(&self, iban: &str, blocked: bool) -> ServiceResult<()> {
        let iban = Iban::parse(iban)?;
        self.repositories
            .resolve()
            .set_blocked(&iban, blocked)
            .await?
            .map(|_| ())
            .ok_or(ServiceError::NotFound("account"))
    }

    /// Issue a new card for the holder and attach it to the account.
    pub async fn attach_card(&self, iban: &str) -> ServiceResult<Account> {
        let iban = Iban::parse(iban)?;
        let repo = self.repositories.resolve();

        let account = repo
            .find(&iban)
            .await?
            .ok_or(ServiceError::NotFound("account"))?;

        let pan = self.cards.create_card(&account.name).await?;

        repo.add_card(&iban, &pan)
            .await?
            .ok_or(ServiceError::NotFound("account"))
    }

    /// Cancel one of the account's cards and detach it.
    pub async fn detach_card(&self, iban: &str, pan: &str) -> ServiceResult<Account> {
        let iban = Iban::parse(iban)?;
        if pan.trim().is_empty() {
            return Err(ServiceError::Validation("pan must not be empty".into()));
        }
        let repo = self.repositories.resolve();

        let account = repo
            .find(&iban)
            .await?
            .ok_or(ServiceError::NotFound("account"))?;
        if !account.has_card(pan) {
            return Err(ServiceError::NotFound("card"));
        }

        let confirmed = self.cards.delete_card(pan).await?;
        repo.remove_card(&iban, &confirmed).await?;

        repo.find(&iban)
            .await?
            .ok_or(ServiceError::NotFound("account"))
    }

    /// Value of the balance in another currency.
    pub async fn convert_balance(&self, iban: &str, to: &str) -> ServiceResult<Conversion> {
        let iban = Iban::parse(iban)?;
        let to = to.trim().to_ascii_uppercase();
        if to.len() != 3 || !to.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ServiceError::Validation(format!("invalid currency code: {to}")));
        }

        let account = self
            .repositories
            .resolve()
            .find(&iban)
            .await?
            .ok_or(ServiceError::NotFound("account"))?;

        Ok(self
            .currencies
            .convert(&self.base_currency, &to, account.balance)
            .await?)
    }
}

fn validate_email(email: &str) -> ServiceResult<()> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!("invalid email: {email}")))
    }
}

fn parse_tier(subscription: &str) -> ServiceResult<SubscriptionTier> {
    SubscriptionTier::from_str(subscription)
        .ok_or_else(|| ServiceError::Validation(format!("invalid subscription: {subscription}")))
}
