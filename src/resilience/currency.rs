use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::client::{ServiceClient, ServiceUnavailable};

/// Result of a currency conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub from: String,
    pub to: String,
    pub original_amount: Decimal,
    pub converted_amount: Decimal,
}

#[async_trait]
pub trait CurrencyExchange: Send + Sync {
    async fn convert(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<Conversion, ServiceUnavailable>;
}

/// Currency exchange microservice client.
pub struct CurrencyClient {
    client: ServiceClient,
    endpoint: String,
}

impl CurrencyClient {
    pub fn new(client: ServiceClient, endpoint: impl Into<String>) -> Self {
        CurrencyClient {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CurrencyExchange for CurrencyClient {
    async fn convert(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<Conversion, ServiceUnavailable> {
        let url = self.client.url(&self.endpoint);
        let amount = amount.to_string();
        self.client
            .invoke(|http| {
                http.get(url)
                    .query(&[("from", from), ("to", to), ("amount", amount.as_str())])
            })
            .await
    }
}
