use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use crate::service::{AccountChanges as UpdateAccountRequest, NewAccount as CreateAccountRequest};

/// Balance operation: positive credits, negative debits.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceOperationRequest {
    pub balance: Decimal,
}

/// Card to detach from an account.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteCardRequest {
    pub pan: String,
}

/// Target currency for a balance conversion.
#[derive(Debug, Deserialize)]
pub struct ExchangeQuery {
    pub to: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_accepts_number_or_string() {
        let number: BalanceOperationRequest = serde_json::from_str(r#"{"balance": -20.5}"#).unwrap();
        let string: BalanceOperationRequest =
            serde_json::from_str(r#"{"balance": "-20.50"}"#).unwrap();

        assert_eq!(number.balance, string.balance);
    }

    #[test]
    fn test_create_defaults_to_free_tier() {
        let request: CreateAccountRequest =
            serde_json::from_str(r#"{"name": "Test User", "email": "test@example.com"}"#).unwrap();

        assert_eq!(request.subscription, "Free");
    }

    #[test]
    fn test_update_fields_are_optional() {
        let request: UpdateAccountRequest = serde_json::from_str(r#"{"email": "a@b.es"}"#).unwrap();

        assert!(request.name.is_none());
        assert_eq!(request.email.as_deref(), Some("a@b.es"));
    }
}
