use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::{ServiceClient, ServiceUnavailable};

/// Card issuing operations the account service depends on.
#[async_trait]
pub trait CardIssuer: Send + Sync {
    /// Issue a card for the holder and return its PAN.
    async fn create_card(&self, holder_name: &str) -> Result<String, ServiceUnavailable>;

    /// Cancel a card and return the PAN the service confirmed.
    async fn delete_card(&self, pan: &str) -> Result<String, ServiceUnavailable>;
}

#[derive(Debug, Serialize)]
struct CreateCardRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct DeleteCardRequest<'a> {
    pan: &'a str,
}

#[derive(Debug, Deserialize)]
struct CardResponse {
    pan: String,
}

/// Cards microservice client.
pub struct CardsClient {
    client: ServiceClient,
    endpoint: String,
}

impl CardsClient {
    pub fn new(client: ServiceClient, endpoint: impl Into<String>) -> Self {
        CardsClient {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CardIssuer for CardsClient {
    async fn create_card(&self, holder_name: &str) -> Result<String, ServiceUnavailable> {
        let url = self.client.url(&self.endpoint);
        let body = CreateCardRequest { name: holder_name };
        let response: CardResponse = self
            .client
            .invoke(|http| http.post(url).json(&body))
            .await?;
        Ok(response.pan)
    }

    async fn delete_card(&self, pan: &str) -> Result<String, ServiceUnavailable> {
        let url = self.client.url(&self.endpoint);
        let body = DeleteCardRequest { pan };
        let response: CardResponse = self
            .client
            .invoke(|http| http.delete(url).json(&body))
            .await?;
        Ok(response.pan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MetricsRegistry;
    use crate::resilience::BreakerConfig;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cards(server: &MockServer) -> CardsClient {
        let client = ServiceClient::new(
            "cards",
            server.uri(),
            Duration::from_millis(500),
            BreakerConfig::default(),
            Arc::new(MetricsRegistry::new()),
        )
        .unwrap();
        CardsClient::new(client, "/v1/card")
    }

    #[tokio::test]
    async fn test_create_card_posts_holder_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/card"))
            .and(body_json(json!({"name": "Test User"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pan": "4111111111111111"})))
            .expect(1)
            .mount(&server)
            .await;

        let pan = cards(&server).create_card("Test User").await.unwrap();

        assert_eq!(pan, "4111111111111111");
    }

    #[tokio::test]
    async fn test_delete_card_sends_pan() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/card"))
            .and(body_json(json!({"pan": "4111111111111111"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pan": "4111111111111111"})))
            .expect(1)
            .mount(&server)
            .await;

        let pan = cards(&server).delete_card("4111111111111111").await.unwrap();

        assert_eq!(pan, "4111111111111111");
    }

    #[tokio::test]
    async fn test_remote_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = cards(&server).create_card("Test User").await.unwrap_err();

        assert_eq!(err.service, "cards");
    }
}
