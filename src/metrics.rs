//! Prometheus metrics for LaunchGuard
//!
//! Exposes metrics endpoint for monitoring:
//! - Verification cache hits/misses
//! - External fetch outcomes and retries per chain
//! - Assessments by level, failures by kind, latency
//! - Tokens discovered per chain

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics state
pub struct MetricsState {
    /// Prometheus registry
    registry: Registry,
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    /// Fetch outcomes by chain and outcome (ok, transient, rate_limited, ...)
    pub fetch_total: IntCounterVec,
    pub fetch_retries: IntCounterVec,
    /// Completed assessments by chain and level
    pub assessments: IntCounterVec,
    /// Analyses that produced no verdict, by chain and kind
    pub assessments_failed: IntCounterVec,
    /// Assessment latency histogram (in milliseconds)
    pub assessment_latency: Histogram,
    pub tokens_discovered: IntCounterVec,
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::with_opts(Opts::new(name, help))
        .unwrap_or_else(|e| panic!("Failed to create {}: {}", name, e));
    registry
        .register(Box::new(counter.clone()))
        .unwrap_or_else(|e| panic!("Failed to register {}: {}", name, e));
    counter
}

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)
        .unwrap_or_else(|e| panic!("Failed to create {}: {}", name, e));
    registry
        .register(Box::new(counter.clone()))
        .unwrap_or_else(|e| panic!("Failed to register {}: {}", name, e));
    counter
}

impl MetricsState {
    /// Create a new metrics state with all metrics registered
    pub fn new() -> Self {
        let registry = Registry::new();

        let cache_hits = counter(
            &registry,
            "launchguard_cache_hits_total",
            "Verification cache hits",
        );
        let cache_misses = counter(
            &registry,
            "launchguard_cache_misses_total",
            "Verification cache misses (computations started)",
        );
        let fetch_total = counter_vec(
            &registry,
            "launchguard_fetch_total",
            "External lookups by outcome",
            &["chain", "outcome"],
        );
        let fetch_retries = counter_vec(
            &registry,
            "launchguard_fetch_retries_total",
            "Retried external lookups",
            &["chain"],
        );
        let assessments = counter_vec(
            &registry,
            "launchguard_assessments_total",
            "Completed risk assessments by level",
            &["chain", "level"],
        );
        let assessments_failed = counter_vec(
            &registry,
            "launchguard_assessments_failed_total",
            "Analyses that ended without a verdict",
            &["chain", "kind"],
        );
        let tokens_discovered = counter_vec(
            &registry,
            "launchguard_tokens_discovered_total",
            "Newly deployed tokens discovered",
            &["chain"],
        );

        let assessment_latency = Histogram::with_opts(
            HistogramOpts::new(
                "launchguard_assessment_latency_ms",
                "End-to-end assessment latency in milliseconds",
            )
            .buckets(vec![
                50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 60000.0,
            ]),
        )
        .expect("Failed to create assessment_latency histogram");
        registry
            .register(Box::new(assessment_latency.clone()))
            .expect("Failed to register assessment_latency");

        Self {
            registry,
            cache_hits,
            cache_misses,
            fetch_total,
            fetch_retries,
            assessments,
            assessments_failed,
            assessment_latency,
            tokens_discovered,
        }
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for MetricsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics handler - returns Prometheus metrics in text format
///
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.registry().gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("Content-Type", "text/plain; version=0.0.4")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        buffer,
    )
}

/// Create metrics router
pub fn metrics_router() -> Router<Arc<MetricsState>> {
    Router::new().route("/metrics", get(metrics_handler))
}
