//! # HTTP Router Tests
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`,
//! including the signature-header authentication layer.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{conditional_with_cost, conditional_with_roots, entrypoint_tx, MockBackend};
use conditional_tx_gateway::domain::error::{codes, ApiError};
use conditional_tx_gateway::domain::transaction::decode_transaction;
use conditional_tx_gateway::middleware::auth::signature_header_value;
use conditional_tx_gateway::{ConditionalGatewayService, FailureReason, GatewayConfig};
use secp256k1::SecretKey;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const AUTH_HEADER: &str = "X-Optimism-Signature";

fn gateway(enabled: bool) -> (ConditionalGatewayService, Arc<MockBackend>) {
    gateway_with(enabled, MockBackend::new())
}

fn gateway_with(
    enabled: bool,
    backend: MockBackend,
) -> (ConditionalGatewayService, Arc<MockBackend>) {
    let mut config = GatewayConfig::default();
    config.conditional.enabled = enabled;
    config.conditional.backend_url = "http://backend.invalid:8545".into();
    config.rate_limit.capacity = 100;
    config.rate_limit.refill_per_second = 10;

    let backend = Arc::new(backend);
    let service = ConditionalGatewayService::new(config, backend.clone()).unwrap();
    (service, backend)
}

fn signer() -> SecretKey {
    SecretKey::from_slice(&[0x2a; 32]).unwrap()
}

fn rpc_body(id: u64, params: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "eth_sendRawTransactionConditional",
        "params": params
    })
    .to_string()
}

fn signed_request(body: String) -> Request<Body> {
    let header = signature_header_value(&signer(), body.as_bytes());
    Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .header(AUTH_HEADER, header)
        .body(Body::from(body))
        .unwrap()
}

fn unsigned_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn call(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_signed_request_accepted() {
    let (gateway, backend) = gateway(true);
    let router = gateway.router().unwrap();

    let tx = entrypoint_tx(0);
    let body = rpc_body(1, json!([tx, conditional_with_cost(10)]));
    let (status, value) = call(&router, signed_request(body)).await;

    assert_eq!(status, StatusCode::OK);
    let expected = decode_transaction(tx.as_slice()).unwrap().hash;
    assert_eq!(value["id"], 1);
    assert_eq!(value["result"], json!(expected));
    assert_eq!(backend.call_count(), 1);
    assert_eq!(backend.calls()[0].1, conditional_with_cost(10));
}

#[tokio::test]
async fn test_unsigned_request_missing_authentication() {
    let (gateway, backend) = gateway(true);
    let router = gateway.router().unwrap();

    let body = rpc_body(2, json!([entrypoint_tx(0), conditional_with_cost(10)]));
    let (status, value) = call(&router, unsigned_request(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["error"]["code"], codes::CONDITIONAL_REJECTED);
    assert_eq!(value["error"]["message"], "missing authentication");
    assert_eq!(backend.call_count(), 0);
    assert_eq!(
        gateway
            .conditional()
            .metrics()
            .failures(FailureReason::MissingAuth),
        1
    );
}

#[tokio::test]
async fn test_signature_over_different_body_rejected() {
    let (gateway, backend) = gateway(true);
    let router = gateway.router().unwrap();

    let signed_for = rpc_body(3, json!([entrypoint_tx(0), conditional_with_cost(10)]));
    let header = signature_header_value(&signer(), signed_for.as_bytes());
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header(AUTH_HEADER, header)
        .body(Body::from(rpc_body(
            3,
            json!([entrypoint_tx(1), conditional_with_cost(10)]),
        )))
        .unwrap();

    let (status, value) = call(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        value["error"]["message"],
        "Invalid request: mismatched recovered signer"
    );
    assert_eq!(backend.call_count(), 0);
    // Rejected before the pipeline ran
    assert_eq!(gateway.conditional().metrics().requests(), 0);
}

#[tokio::test]
async fn test_malformed_auth_header_rejected() {
    let (gateway, _) = gateway(true);
    let router = gateway.router().unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header(AUTH_HEADER, "not-a-signature")
        .body(Body::from(rpc_body(4, json!([]))))
        .unwrap();

    let (status, value) = call(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"]["message"], "Invalid request: invalid auth header");
}

#[tokio::test]
async fn test_cost_exceeded_code() {
    let (gateway, _) = gateway(true);
    let router = gateway.router().unwrap();

    let body = rpc_body(5, json!([entrypoint_tx(0), conditional_with_roots(501)]));
    let (_, value) = call(&router, signed_request(body)).await;

    assert_eq!(value["error"]["code"], codes::CONDITIONAL_COST_EXCEEDED_MAX);
    assert_eq!(
        value["error"]["message"],
        "conditional cost, 1002, exceeded max: 1000"
    );
}

#[tokio::test]
async fn test_disabled_endpoint_over_http() {
    let (gateway, _) = gateway(false);
    let router = gateway.router().unwrap();

    let body = rpc_body(6, json!([entrypoint_tx(0), conditional_with_cost(10)]));
    let (_, value) = call(&router, signed_request(body)).await;

    assert_eq!(value["error"]["code"], codes::CONDITIONAL_REJECTED);
    assert_eq!(value["error"]["message"], "endpoint disabled");
}

#[tokio::test]
async fn test_bad_params_invalid_params() {
    let (gateway, _) = gateway(true);
    let router = gateway.router().unwrap();

    let body = rpc_body(7, json!(["0xzz", {}]));
    let (_, value) = call(&router, signed_request(body)).await;
    assert_eq!(value["error"]["code"], codes::INVALID_PARAMS);

    let body = rpc_body(8, json!([entrypoint_tx(0)]));
    let (_, value) = call(&router, signed_request(body)).await;
    assert_eq!(value["error"]["code"], codes::INVALID_PARAMS);
}

#[tokio::test]
async fn test_unknown_method() {
    let (gateway, _) = gateway(true);
    let router = gateway.router().unwrap();

    let body = json!({"jsonrpc": "2.0", "id": 9, "method": "eth_sendRawTransaction", "params": []})
        .to_string();
    let (_, value) = call(&router, unsigned_request(body)).await;
    assert_eq!(value["error"]["code"], codes::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn test_parse_error() {
    let (gateway, _) = gateway(true);
    let router = gateway.router().unwrap();

    let (status, value) = call(&router, unsigned_request("{not json".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"]["code"], codes::PARSE_ERROR);
}

#[tokio::test]
async fn test_batch_shares_caller_identity() {
    let (gateway, backend) = gateway(true);
    let router = gateway.router().unwrap();

    let batch = json!([
        {
            "jsonrpc": "2.0",
            "id": 10,
            "method": "eth_sendRawTransactionConditional",
            "params": [entrypoint_tx(0), conditional_with_cost(10)]
        },
        {
            "jsonrpc": "2.0",
            "id": 11,
            "method": "web3_clientVersion",
            "params": []
        }
    ])
    .to_string();

    let (status, value) = call(&router, signed_request(batch)).await;
    assert_eq!(status, StatusCode::OK);

    let responses = value.as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert!(responses[0]["result"].is_string());
    assert_eq!(responses[1]["error"]["code"], codes::METHOD_NOT_FOUND);
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_empty_batch_invalid_request() {
    let (gateway, _) = gateway(true);
    let router = gateway.router().unwrap();

    let (_, value) = call(&router, unsigned_request("[]".into())).await;
    assert_eq!(value["error"]["code"], codes::INVALID_REQUEST);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (gateway, _) = gateway(true);
    let router = gateway.router().unwrap();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, value) = call(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["status"], "healthy");
    assert_eq!(value["conditional_enabled"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (gateway, _) = gateway(true);
    let router = gateway.router().unwrap();

    let body = rpc_body(12, json!([entrypoint_tx(0), conditional_with_cost(10)]));
    call(&router, unsigned_request(body)).await;

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("txproxy_txconditional_requests 1"));
    assert!(text.contains("txproxy_txconditional_failures{reason=\"missing_auth\"} 1"));
}

async fn scrape(router: &Router) -> String {
    let response = router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn has_sample(text: &str, name: &str, labels: &[&str], value: &str) -> bool {
    text.lines().any(|line| {
        line.starts_with(&format!("{name}{{"))
            && labels.iter().all(|l| line.contains(l))
            && line.ends_with(&format!(" {value}"))
    })
}

#[tokio::test]
async fn test_backend_call_metrics_exported() {
    let (gateway, backend) = gateway(true);
    let router = gateway.router().unwrap();

    // Rejected before the backend: no backend call recorded
    let body = rpc_body(13, json!([entrypoint_tx(0), conditional_with_cost(10)]));
    call(&router, unsigned_request(body)).await;
    let body = rpc_body(14, json!([entrypoint_tx(1), conditional_with_cost(10)]));
    call(&router, signed_request(body)).await;
    assert_eq!(backend.call_count(), 1);

    let text = scrape(&router).await;
    let method = "method=\"eth_sendRawTransactionConditional\"";
    assert!(has_sample(
        &text,
        "txproxy_backend_rpc_client_requests_total",
        &[method],
        "1"
    ));
    assert!(has_sample(
        &text,
        "txproxy_backend_rpc_client_responses_total",
        &[method, "error=\"none\""],
        "1"
    ));
    assert!(has_sample(
        &text,
        "txproxy_backend_rpc_client_request_duration_seconds_count",
        &[method],
        "1"
    ));
}

#[tokio::test]
async fn test_backend_error_metrics_exported() {
    let (gateway, backend) =
        gateway_with(true, MockBackend::failing(ApiError::new(-32003, "known transaction")));
    let router = gateway.router().unwrap();

    let body = rpc_body(15, json!([entrypoint_tx(0), conditional_with_cost(10)]));
    let (_, value) = call(&router, signed_request(body)).await;
    assert_eq!(value["error"]["code"], -32003);
    assert_eq!(backend.call_count(), 1);

    let text = scrape(&router).await;
    let method = "method=\"eth_sendRawTransactionConditional\"";
    assert!(has_sample(
        &text,
        "txproxy_backend_rpc_client_responses_total",
        &[method, "error=\"-32003\""],
        "1"
    ));
    assert!(text.contains("txproxy_txconditional_failures{reason=\"backend\"} 1"));
}

#[tokio::test]
async fn test_shutdown_stops_server() {
    let (gateway, _) = gateway(true);
    let gateway = Arc::new(gateway);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();

    let server = {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move { gateway.serve(listener).await })
    };

    gateway.shutdown();
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
        .await
        .expect("server should stop after shutdown")
        .unwrap();
    assert!(result.is_ok());
}
