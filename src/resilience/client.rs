use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

use crate::observability::MetricsRegistry;

use super::circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitState};

/// Why a guarded call did not succeed.
#[derive(Error, Debug)]
pub enum CallFailure {
    #[error("circuit breaker is open")]
    Open,

    #[error("remote returned status {0}")]
    RemoteStatus(StatusCode),

    #[error("connection failed: {0}")]
    Transport(reqwest::Error),

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for CallFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            CallFailure::Transport(e)
        } else if let Some(status) = e.status() {
            CallFailure::RemoteStatus(status)
        } else {
            CallFailure::Unexpected(e.to_string())
        }
    }
}

/// A dependent service could not serve the call. Callers never learn why.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{service} service is unavailable")]
pub struct ServiceUnavailable {
    pub service: String,
}

/// HTTP client for one dependent microservice, guarded by its own breaker.
pub struct ServiceClient {
    name: String,
    base_url: String,
    http: reqwest::Client,
    breaker: CircuitBreaker,
    metrics: Arc<MetricsRegistry>,
}

impl ServiceClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        breaker: BreakerConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Result<Self, reqwest::Error> {
        let name = name.into();
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(ServiceClient {
            breaker: CircuitBreaker::new(name.clone(), breaker),
            name,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            metrics,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Absolute URL for an endpoint path on this service.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Run one request through the breaker and decode a JSON body.
    ///
    /// `build` receives the shared HTTP client; the request is only built
    /// when the breaker admits the call.
    pub async fn invoke<T, F>(&self, build: F) -> Result<T, ServiceUnavailable>
    where
        T: DeserializeOwned,
        F: FnOnce(&reqwest::Client) -> RequestBuilder,
    {
        match self.execute(build).await {
            Ok(body) => Ok(body),
            Err(failure) => {
                self.report(&failure);
                Err(ServiceUnavailable {
                    service: self.name.clone(),
                })
            }
        }
    }

    async fn execute<T, F>(&self, build: F) -> Result<T, CallFailure>
    where
        T: DeserializeOwned,
        F: FnOnce(&reqwest::Client) -> RequestBuilder,
    {
        let permit = self.breaker.acquire().ok_or(CallFailure::Open)?;

        let outcome = self.send(build).await;
        match &outcome {
            Ok(_) => permit.success(),
            Err(_) => permit.failure(),
        }
        outcome
    }

    async fn send<T, F>(&self, build: F) -> Result<T, CallFailure>
    where
        T: DeserializeOwned,
        F: FnOnce(&reqwest::Client) -> RequestBuilder,
    {
        let response = build(&self.http).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallFailure::RemoteStatus(status));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CallFailure::Unexpected(e.to_string()))
    }

    fn report(&self, failure: &CallFailure) {
        match failure {
            CallFailure::Open => {
                self.metrics.record_breaker_rejection();
                warn!(dependency = %self.name, "Circuit breaker open: skipping call");
            }
            CallFailure::RemoteStatus(status) => {
                self.metrics.record_dependency_failure();
                error!(
                    dependency = %self.name,
                    status = status.as_u16(),
                    "Dependency returned error status"
                );
            }
            CallFailure::Transport(e) => {
                self.metrics.record_dependency_failure();
                error!(dependency = %self.name, error = %e, "Dependency connection failed");
            }
            CallFailure::Unexpected(e) => {
                self.metrics.record_dependency_failure();
                error!(dependency = %self.name, error = %e, "Unexpected dependency failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pong {
        ok: bool,
    }

    fn client(base_url: &str, fail_max: u32, metrics: Arc<MetricsRegistry>) -> ServiceClient {
        ServiceClient::new(
            "test",
            base_url,
            Duration::from_millis(200),
            BreakerConfig {
                fail_max,
                timeout_duration: Duration::from_millis(50),
            },
            metrics,
        )
        .unwrap()
    }

    async fn ping(client: &ServiceClient) -> Result<Pong, ServiceUnavailable> {
        let url = client.url("/ping");
        client.invoke(|http| http.get(url)).await
    }

    #[tokio::test]
    async fn test_success_decodes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server.uri(), 3, Arc::new(MetricsRegistry::new()));

        assert_eq!(ping(&client).await.unwrap(), Pong { ok: true });
    }

    #[tokio::test]
    async fn test_every_failure_class_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        let metrics = Arc::new(MetricsRegistry::new());
        let client = client(&server.uri(), 10, metrics.clone());

        let status = ping(&client).await.unwrap_err();
        let decode = ping(&client).await.unwrap_err();

        assert_eq!(status, decode);
        assert_eq!(status.service, "test");
        assert_eq!(metrics.dependency_failures.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_is_unavailable() {
        // Nothing listens on port 1.
        let client = client("http://127.0.0.1:1", 3, Arc::new(MetricsRegistry::new()));

        assert!(ping(&client).await.is_err());
    }

    #[tokio::test]
    async fn test_open_breaker_skips_network_then_probes_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;
        let metrics = Arc::new(MetricsRegistry::new());
        let client = client(&server.uri(), 2, metrics.clone());

        assert!(ping(&client).await.is_err());
        assert!(ping(&client).await.is_err());
        assert_eq!(client.breaker_state(), CircuitState::Open);

        // Short-circuited: the server sees no third request.
        assert!(ping(&client).await.is_err());
        assert_eq!(metrics.breaker_rejections.load(Ordering::Relaxed), 1);
        server.verify().await;

        server.reset().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(ping(&client).await.is_ok());
        assert_eq!(client.breaker_state(), CircuitState::Closed);
    }
}
