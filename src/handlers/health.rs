//! Health check endpoint

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use super::AppState;
use crate::engine::EngineCacheStats;
use crate::models::Chain;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall system status
    pub status: HealthStatus,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime_seconds: i64,
    /// Chains with a configured data source
    pub chains: Vec<Chain>,
    /// Result store status
    pub store: ComponentHealth,
    pub caches: EngineCacheStats,
}

/// Health status enum
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Serving, but some component is impaired
    Degraded,
    /// Critical systems failing
    Unhealthy,
}

/// Component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Health check handler
///
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let engine = state.pipeline.engine();

    let store = match state.pipeline.store().recent(1).await {
        Ok(_) => ComponentHealth {
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => {
            tracing::error!(error = %e, "Result store health check failed");
            ComponentHealth {
                status: HealthStatus::Unhealthy,
                message: Some(e.to_string()),
            }
        }
    };

    let chains = engine.chains();
    let status = if store.status == HealthStatus::Unhealthy {
        HealthStatus::Unhealthy
    } else if chains.is_empty() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let status_code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime,
        chains,
        store,
        caches: engine.cache_stats(),
    };

    (status_code, Json(response))
}
