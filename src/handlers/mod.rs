//! HTTP handlers for LaunchGuard
//!
//! A thin layer over the assessment pipeline: on-demand assessment, stored
//! verdict queries, health and metrics.

mod api;
mod health;

pub use api::*;
pub use health::*;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::engine::AssessmentPipeline;
use crate::metrics::{metrics_router, MetricsState};

/// Shared state for all handlers
pub struct AppState {
    pub pipeline: AssessmentPipeline,
    /// Application start time
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: AssessmentPipeline) -> Self {
        Self {
            pipeline,
            started_at: Utc::now(),
        }
    }
}

/// Build the full application router
pub fn router(state: Arc<AppState>, metrics: Arc<MetricsState>) -> Router {
    let api_routes = Router::new()
        .route("/assess", post(assess_token))
        .route("/tokens/recent", get(recent_assessments))
        .route("/tokens/:chain/:address/history", get(token_history))
        .route("/tokens/:chain/:address/report", get(token_report))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health_check))
        .with_state(state);

    let metrics_routes = metrics_router().with_state(metrics);

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
