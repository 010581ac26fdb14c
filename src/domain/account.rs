use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use super::iban::Iban;

/// How long a paid subscription stays active once set.
pub const PREMIUM_PERIOD_DAYS: i64 = 30;

/// Subscription tier of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SubscriptionTier {
    #[default]
    Free,
    Premium,
}

impl SubscriptionTier {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Free" => Some(SubscriptionTier::Free),
            "Premium" => Some(SubscriptionTier::Premium),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "Free",
            SubscriptionTier::Premium => "Premium",
        }
    }

    /// Expiry of a subscription to this tier starting at `from`.
    pub fn expiry_from(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            SubscriptionTier::Free => None,
            SubscriptionTier::Premium => Some(from + Duration::days(PREMIUM_PERIOD_DAYS)),
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Card reference (PAN) attached to an account.
pub type CardRef = String;

/// Ordered set of attached cards. Most accounts hold a handful.
pub type CardSet = SmallVec<[CardRef; 4]>;

/// Bank account record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier
    pub iban: Iban,

    /// Display name of the holder
    pub name: String,

    pub email: String,

    pub subscription: SubscriptionTier,

    /// Current balance, two decimal places
    pub balance: Decimal,

    #[serde(rename = "isBlocked")]
    pub is_blocked: bool,

    #[serde(rename = "creation_date")]
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub cards: CardSet,
}

impl Account {
    /// Build a fresh account with zero balance and no cards.
    pub fn open(
        iban: Iban,
        name: impl Into<String>,
        email: impl Into<String>,
        subscription: SubscriptionTier,
    ) -> Self {
        let now = Utc::now();
        Account {
            iban,
            name: name.into(),
            email: email.into(),
            subscription,
            balance: Decimal::ZERO,
            is_blocked: false,
            created_at: now,
            subscription_expires_at: subscription.expiry_from(now),
            cards: CardSet::new(),
        }
    }

    pub fn has_card(&self, pan: &str) -> bool {
        self.cards.iter().any(|c| c == pan)
    }

    /// Apply a patch in place (used by in-memory stores).
    pub fn apply(&mut self, patch: &AccountPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        if let Some(subscription) = patch.subscription {
            self.subscription = subscription;
        }
        if let Some(expiry) = patch.subscription_expires_at {
            self.subscription_expires_at = expiry;
        }
        if let Some(balance) = patch.balance {
            self.balance = balance;
        }
    }
}

/// Partial update of an account. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subscription: Option<SubscriptionTier>,
    /// `Some(None)` clears the expiry.
    pub subscription_expires_at: Option<Option<DateTime<Utc>>>,
    pub balance: Option<Decimal>,
}

impl AccountPatch {
    pub fn balance(balance: Decimal) -> Self {
        AccountPatch {
            balance: Some(balance),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.subscription.is_none()
            && self.subscription_expires_at.is_none()
            && self.balance.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Account {
        Account::open(
            Iban::parse("ES9121000418450200051332").unwrap(),
            "Test User",
            "test@example.com",
            SubscriptionTier::Free,
        )
    }

    #[test]
    fn test_open_account_defaults() {
        let account = sample();

        assert_eq!(account.balance, Decimal::ZERO);
        assert!(!account.is_blocked);
        assert!(account.cards.is_empty());
        assert!(account.subscription_expires_at.is_none());
    }

    #[test]
    fn test_premium_expiry() {
        let now = Utc::now();
        let expiry = SubscriptionTier::Premium.expiry_from(now).unwrap();
        assert_eq!(expiry - now, Duration::days(PREMIUM_PERIOD_DAYS));
    }

    #[test]
    fn test_apply_patch() {
        let mut account = sample();
        let patch = AccountPatch {
            name: Some("New Name".to_string()),
            subscription: Some(SubscriptionTier::Premium),
            subscription_expires_at: Some(Some(Utc::now())),
            ..Default::default()
        };

        account.apply(&patch);

        assert_eq!(account.name, "New Name");
        assert_eq!(account.email, "test@example.com");
        assert_eq!(account.subscription, SubscriptionTier::Premium);
        assert!(account.subscription_expires_at.is_some());
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(sample()).unwrap();

        assert_eq!(json["iban"], "ES9121000418450200051332");
        assert_eq!(json["subscription"], "Free");
        assert_eq!(json["isBlocked"], false);
        assert!(json.get("creation_date").is_some());
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_balance() {
        let mut account = sample();
        account.balance = Decimal::new(115050, 2);
        account.cards.push("4111111111111111".to_string());

        let json = serde_json::to_string(&account).unwrap();
        let back: Account = serde_json::from_str(&json).unwrap();

        assert_eq!(back, account);
    }
}
