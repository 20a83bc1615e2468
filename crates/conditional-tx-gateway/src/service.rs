//! Gateway service - HTTP JSON-RPC server and routing.

use crate::domain::config::GatewayConfig;
use crate::domain::conditional::TransactionConditional;
use crate::domain::error::{codes, ApiError, GatewayError};
use crate::domain::types::{Bytes, CallerIdentity};
use crate::middleware::{AuthConfig, AuthLayer, ConditionalMetrics, TracingLayer};
use crate::ports::{ConditionalBackend, SEND_RAW_TRANSACTION_CONDITIONAL};
use crate::rpc::ConditionalTxService;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::{error, info};

/// Maximum length of a string request id
const MAX_ID_LENGTH: usize = 256;

/// Conditional gateway service state
pub struct ConditionalGatewayService {
    config: GatewayConfig,
    conditional: Arc<ConditionalTxService>,
    shutdown: CancellationToken,
}

impl ConditionalGatewayService {
    /// Create a new gateway service around a backend client
    pub fn new(
        config: GatewayConfig,
        backend: Arc<dyn ConditionalBackend>,
    ) -> Result<Self, GatewayError> {
        // Validate configuration
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let metrics = ConditionalMetrics::new()?;
        let conditional = Arc::new(ConditionalTxService::from_config(&config, backend, metrics));

        Ok(Self {
            config,
            conditional,
            shutdown: CancellationToken::new(),
        })
    }

    /// Admission pipeline behind the router
    pub fn conditional(&self) -> Arc<ConditionalTxService> {
        Arc::clone(&self.conditional)
    }

    /// Token that stops the server and aborts pending admissions when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Build HTTP router for JSON-RPC
    pub fn router(&self) -> Result<Router, GatewayError> {
        let state = AppState {
            conditional: Arc::clone(&self.conditional),
            shutdown: self.shutdown.clone(),
        };

        let auth = AuthConfig::new(&self.config.auth.header, self.config.auth.max_body_size)
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        // Build middleware stack
        let middleware = ServiceBuilder::new()
            .layer(TracingLayer::new())
            .layer(AuthLayer::new(auth));

        Ok(Router::new()
            .route("/", post(handle_json_rpc))
            .route("/health", get(health_check))
            .route("/metrics", get(metrics_text))
            .layer(middleware)
            .layer(DefaultBodyLimit::max(self.config.auth.max_body_size))
            .with_state(state))
    }

    /// Serve until the shutdown token is cancelled
    pub async fn start(&self) -> Result<(), GatewayError> {
        let addr = self.config.http_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{}: {}", addr, e)))?;

        info!(
            addr = %addr,
            enabled = self.conditional.is_enabled(),
            "Starting conditional transaction gateway"
        );

        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: tokio::net::TcpListener) -> Result<(), GatewayError> {
        let router = self.router()?;
        let shutdown = self.shutdown.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server error");
                GatewayError::Internal(e.to_string())
            })?;

        info!("Conditional transaction gateway stopped");
        Ok(())
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    conditional: Arc<ConditionalTxService>,
    shutdown: CancellationToken,
}

/// Handle JSON-RPC request
async fn handle_json_rpc(
    State(state): State<AppState>,
    caller: Option<Extension<CallerIdentity>>,
    body: String,
) -> impl IntoResponse {
    let caller = caller.map(|Extension(c)| c);

    // Parse request
    let request: serde_json::Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(error_envelope(None, ApiError::parse_error(e.to_string()))),
            );
        }
    };

    // Handle batch or single request
    let response = match request {
        serde_json::Value::Array(requests) if requests.is_empty() => error_envelope(
            None,
            ApiError::invalid_request("empty batch"),
        ),
        serde_json::Value::Array(requests) => serde_json::Value::Array(
            join_all(
                requests
                    .iter()
                    .map(|req| process_single_request(&state, caller, req)),
            )
            .await,
        ),
        single => process_single_request(&state, caller, &single).await,
    };

    (StatusCode::OK, Json(response))
}

/// Process a single JSON-RPC request
async fn process_single_request(
    state: &AppState,
    caller: Option<CallerIdentity>,
    request: &serde_json::Value,
) -> serde_json::Value {
    let id = request.get("id").cloned();

    if let Err(e) = validate_id(id.as_ref()) {
        return error_envelope(None, e);
    }

    let method = match request.get("method").and_then(|m| m.as_str()) {
        Some(method) => method,
        None => {
            return error_envelope(id, ApiError::invalid_request("missing method"));
        }
    };
    let params = request.get("params");

    match route_method(state, caller, method, params).await {
        Ok(value) => serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": value
        }),
        Err(e) => error_envelope(id, e),
    }
}

/// Reject ids that are not a non-empty string or a number.
///
/// Null ids would make the request a notification, which is not supported.
fn validate_id(id: Option<&serde_json::Value>) -> Result<(), ApiError> {
    let Some(id) = id else {
        return Ok(());
    };

    if id.is_null() {
        return Err(ApiError::invalid_request(
            "null id (notifications not supported)",
        ));
    }

    if let Some(s) = id.as_str() {
        if s.is_empty() {
            return Err(ApiError::invalid_request("empty string id"));
        }
        if s.len() > MAX_ID_LENGTH {
            return Err(ApiError::invalid_request(format!(
                "id string too long (max {} chars)",
                MAX_ID_LENGTH
            )));
        }
    }

    if !id.is_string() && !id.is_number() {
        return Err(ApiError::invalid_request("id must be string or number"));
    }

    Ok(())
}

/// Route JSON-RPC method to appropriate handler.
async fn route_method(
    state: &AppState,
    caller: Option<CallerIdentity>,
    method: &str,
    params: Option<&serde_json::Value>,
) -> Result<serde_json::Value, ApiError> {
    match method {
        SEND_RAW_TRANSACTION_CONDITIONAL => {
            let tx: Bytes = parse_param(params, 0)?;
            let condition: TransactionConditional = parse_param(params, 1)?;

            // Shutdown aborts admissions still waiting for capacity
            let cancel = state.shutdown.child_token();
            let hash = state
                .conditional
                .send_raw_transaction_conditional(&cancel, caller, tx, condition)
                .await?;

            serde_json::to_value(hash).map_err(|e| ApiError::internal(e.to_string()))
        }

        _ => Err(ApiError::method_not_found(method)),
    }
}

fn error_envelope(id: Option<serde_json::Value>, error: ApiError) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error
    })
}

/// Parse a required parameter from JSON-RPC params array.
fn parse_param<T: serde::de::DeserializeOwned>(
    params: Option<&serde_json::Value>,
    index: usize,
) -> Result<T, ApiError> {
    let param = params
        .and_then(|p| {
            if p.is_array() {
                p.get(index)
            } else if index == 0 {
                Some(p)
            } else {
                None
            }
        })
        .ok_or_else(|| ApiError::invalid_params(format!("missing parameter at index {}", index)))?;

    serde_json::from_value(param.clone())
        .map_err(|e| ApiError::invalid_params(format!("invalid parameter at index {}: {}", index, e)))
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "conditional-tx-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "conditional_enabled": state.conditional.is_enabled()
    }))
}

/// Prometheus scrape endpoint
async fn metrics_text(State(state): State<AppState>) -> impl IntoResponse {
    match state.conditional.metrics().encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            e.to_string(),
        ),
    }
}
