//! REST API Integration Tests
//!
//! Tests the router end to end with in-process requests:
//! - Health reports configured chains
//! - On-demand assessment followed by history and report queries
//! - Error mapping for unknown tokens and unsupported chains
//! - Prometheus exposition

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use launchguard::handlers::{router, AppState};
use launchguard::metrics::MetricsState;
use launchguard::models::{Chain, RiskLevel};

use crate::support::{engine_with, pipeline_with, MockSocial, MockSource, TestPipeline, CREATOR, TOKEN};

fn app(source: MockSource) -> (Router, TestPipeline) {
    let harness = pipeline_with(engine_with(source, MockSocial::full()), RiskLevel::High);
    let state = Arc::new(AppState::new(harness.pipeline.clone()));
    (router(state, Arc::new(MetricsState::new())), harness)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Health lists the chains with a data source
#[tokio::test]
async fn test_health_reports_chains() {
    let (app, _harness) = app(MockSource::safe(Chain::Ethereum));

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["chains"], json!(["ethereum"]));
    assert_eq!(health["store"]["status"], "healthy");
}

/// Assess, then read the stored verdict back as history and as a report
#[tokio::test]
async fn test_assess_then_query() {
    let (app, harness) = app(MockSource::safe(Chain::Ethereum));

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/assess",
            json!({
                "chain": "ethereum",
                "address": TOKEN,
                "creator": CREATOR,
                "name": "Steady Finance",
                "symbol": "STDY"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let record: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(record["epoch"], 1);
    assert_eq!(record["assessment"]["level"], "LOW");
    assert_eq!(harness.store.record_count(), 1);

    let (status, body) = send(&app, get(&format!("/api/v1/tokens/ethereum/{}/history", TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    let history: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(history["assessments"].as_array().unwrap().len(), 1);
    assert_eq!(history["failures"].as_array().unwrap().len(), 0);

    let (status, body) = send(&app, get(&format!("/api/v1/tokens/eth/{}/report", TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    let report = String::from_utf8(body).unwrap();
    assert!(report.contains("LOWER RISK"));
    assert!(report.contains("Steady Finance"));

    let (status, body) = send(&app, get("/api/v1/tokens/recent?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    let recent: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(recent["total"], 1);
}

/// A token never assessed is 404; a malformed path is 400
#[tokio::test]
async fn test_unknown_token_not_found() {
    let (app, _harness) = app(MockSource::safe(Chain::Ethereum));

    let (status, _) = send(&app, get(&format!("/api/v1/tokens/ethereum/{}/report", TOKEN))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get(&format!("/api/v1/tokens/ethereum/{}/history", TOKEN))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/api/v1/tokens/dogechain/0xabc/history")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Requests for a chain without a data source are rejected and remembered
#[tokio::test]
async fn test_unsupported_chain_rejected() {
    let (app, harness) = app(MockSource::safe(Chain::Ethereum));

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/assess",
            json!({ "chain": "base", "address": TOKEN }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["reason"], "permanent");

    assert_eq!(harness.store.record_count(), 0);
    assert_eq!(harness.store.all_failures().len(), 1);

    let (status, _) = send(&app, post_json("/api/v1/assess", json!({ "chain": "ethereum", "address": " " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Prometheus text exposition is served
#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _harness) = app(MockSource::safe(Chain::Ethereum));

    let (status, _) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
}
