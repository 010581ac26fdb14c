use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::domain::Account;
use crate::monitor::Availability;
use crate::observability::MetricsRegistry;
use crate::resilience::Conversion;
use crate::service::AccountService;

use super::request::{
    BalanceOperationRequest, CreateAccountRequest, DeleteCardRequest, ExchangeQuery,
    UpdateAccountRequest,
};
use super::response::{ApiError, HealthResponse};

/// Shared application state.
pub struct AppState {
    pub accounts: AccountService,

    /// Connection state published by the monitor
    pub availability: Arc<Availability>,

    pub metrics: Arc<MetricsRegistry>,
}

type ApiResult<T> = Result<T, ApiError>;

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/accounts", post(handle_create))
        .route(
            "/v1/accounts/:iban",
            get(handle_get).patch(handle_update).delete(handle_delete),
        )
        .route("/v1/accounts/operation/:iban", patch(handle_balance))
        .route("/v1/accounts/:iban/block", patch(handle_block))
        .route("/v1/accounts/:iban/unblock", patch(handle_unblock))
        .route(
            "/v1/accounts/card/:iban",
            post(handle_attach_card).delete(handle_detach_card),
        )
        .route("/v1/accounts/:iban/exchange", get(handle_exchange))
        .route("/health", get(handle_health))
        .route("/v1/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    let account = state.accounts.create(req).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn handle_get(
    State(state): State<Arc<AppState>>,
    Path(iban): Path<String>,
) -> ApiResult<Json<Account>> {
    Ok(Json(state.accounts.get(&iban).await?))
}

async fn handle_update(
    State(state): State<Arc<AppState>>,
    Path(iban): Path<String>,
    Json(req): Json<UpdateAccountRequest>,
) -> ApiResult<Json<Account>> {
    Ok(Json(state.accounts.update(&iban, req).await?))
}

async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Path(iban): Path<String>,
) -> ApiResult<StatusCode> {
    state.accounts.delete(&iban).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_balance(
    State(state): State<Arc<AppState>>,
    Path(iban): Path<String>,
    Json(req): Json<BalanceOperationRequest>,
) -> ApiResult<Json<Account>> {
    Ok(Json(state.accounts.adjust_balance(&iban, req.balance).await?))
}

async fn handle_block(
    State(state): State<Arc<AppState>>,
    Path(iban): Path<String>,
) -> ApiResult<StatusCode> {
    state.accounts.block(&iban).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_unblock(
    State(state): State<Arc<AppState>>,
    Path(iban): Path<String>,
) -> ApiResult<StatusCode> {
    state.accounts.unblock(&iban).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_attach_card(
    State(state): State<Arc<AppState>>,
    Path(iban): Path<String>,
) -> ApiResult<Json<Account>> {
    Ok(Json(state.accounts.attach_card(&iban).await?))
}

async fn handle_detach_card(
    State(state): State<Arc<AppState>>,
    Path(iban): Path<String>,
    Json(req): Json<DeleteCardRequest>,
) -> ApiResult<Json<Account>> {
    Ok(Json(state.accounts.detach_card(&iban, &req.pan).await?))
}

async fn handle_exchange(
    State(state): State<Arc<AppState>>,
    Path(iban): Path<String>,
    Query(query): Query<ExchangeQuery>,
) -> ApiResult<Json<Conversion>> {
    Ok(Json(state.accounts.convert_balance(&iban, &query.to).await?))
}

/// Up once startup finished and the store is connected.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.availability.is_ready() && state.availability.store_available() {
        (StatusCode::OK, Json(HealthResponse::up()))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse::starting()))
    }
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        state.metrics.to_prometheus(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Iban;
    use crate::monitor::ResourceState;
    use crate::service::accounts::tests::{service_with, FakeCards};
    use crate::storage::MockAccountStore;
    use axum::body::Body;
    use axum::http::Request;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app_state() -> Arc<AppState> {
        let store = Arc::new(MockAccountStore::new());
        Arc::new(AppState {
            accounts: service_with(store, Arc::new(FakeCards::default())),
            availability: Arc::new(crate::monitor::Availability::new()),
            metrics: Arc::new(MetricsRegistry::new()),
        })
    }

    async fn send(
        state: &Arc<AppState>,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create(state: &Arc<AppState>) -> String {
        let (status, body) = send(
            state,
            "POST",
            "/v1/accounts",
            Some(json!({"name": "Test User", "email": "test@example.com", "subscription": "Free"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["iban"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_reports_starting_until_ready() {
        let state = test_app_state();

        let (status, body) = send(&state, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "STARTING");

        state.availability.set_store_state(ResourceState::Connected);
        state.availability.mark_ready();

        let (status, body) = send(&state, "GET", "/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "UP");
    }

    #[tokio::test]
    async fn test_create_and_get_account() {
        let state = test_app_state();
        let iban = create(&state).await;

        let (status, body) = send(&state, "GET", &format!("/v1/accounts/{iban}"), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Test User");
        assert_eq!(body["isBlocked"], false);
    }

    #[tokio::test]
    async fn test_invalid_input_is_bad_request() {
        let state = test_app_state();

        let (status, body) = send(&state, "GET", "/v1/accounts/NOTANIBAN", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        let (status, _) = send(
            &state,
            "POST",
            "/v1/accounts",
            Some(json!({"name": "Test User", "email": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let state = test_app_state();
        let iban = Iban::random_es();

        let (status, _) = send(&state, "GET", &format!("/v1/accounts/{iban}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&state, "DELETE", &format!("/v1/accounts/{iban}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_balance_operation_and_overdraft() {
        let state = test_app_state();
        let iban = create(&state).await;
        let uri = format!("/v1/accounts/operation/{iban}");

        let (status, body) = send(&state, "PATCH", &uri, Some(json!({"balance": 1000}))).await;
        assert_eq!(status, StatusCode::OK);
        let balance: Decimal = body["balance"].as_str().unwrap().parse().unwrap();
        assert_eq!(balance, Decimal::new(1000, 0));

        let (status, body) = send(&state, "PATCH", &uri, Some(json!({"balance": -2000}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_block_and_unblock() {
        let state = test_app_state();
        let iban = create(&state).await;

        let (status, _) = send(&state, "PATCH", &format!("/v1/accounts/{iban}/block"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = send(&state, "GET", &format!("/v1/accounts/{iban}"), None).await;
        assert_eq!(body["isBlocked"], true);

        let (status, _) =
            send(&state, "PATCH", &format!("/v1/accounts/{iban}/unblock"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = send(&state, "GET", &format!("/v1/accounts/{iban}"), None).await;
        assert_eq!(body["isBlocked"], false);
    }

    #[tokio::test]
    async fn test_card_routes() {
        let state = test_app_state();
        let iban = create(&state).await;
        let uri = format!("/v1/accounts/card/{iban}");

        let (status, body) = send(&state, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let pan = body["cards"][0].as_str().unwrap().to_string();

        let (status, body) = send(&state, "DELETE", &uri, Some(json!({"pan": pan}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cards"], json!([]));
    }

    #[tokio::test]
    async fn test_exchange_route() {
        let state = test_app_state();
        let iban = create(&state).await;

        let (status, body) = send(
            &state,
            "GET",
            &format!("/v1/accounts/{iban}/exchange?to=USD"),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["from"], "EUR");
        assert_eq!(body["to"], "USD");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let state = test_app_state();
        let iban = create(&state).await;
        send(&state, "GET", &format!("/v1/accounts/{iban}"), None).await;

        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let response = create_router(state.clone()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("accounts_cache_hits_total"));
    }
}
