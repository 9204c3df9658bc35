//! REST API handlers for LaunchGuard
//!
//! Provides endpoints for:
//! - Assess: run an on-demand assessment and persist it
//! - Tokens: recent verdicts, per-token history and text report

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::engine::render_report;
use crate::error::{EngineError, EngineResult};
use crate::models::{AssessmentRecord, Chain, FailureRecord, TokenLaunch};

const DEFAULT_RECENT_LIMIT: usize = 20;
const MAX_RECENT_LIMIT: usize = 500;

// =============================================================================
// ASSESS API
// =============================================================================

/// Request body for an on-demand assessment
#[derive(Debug, Deserialize)]
pub struct AssessRequest {
    pub chain: Chain,
    pub address: String,
    pub creator: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    #[serde(default)]
    pub pool_address: Option<String>,
}

impl AssessRequest {
    fn into_launch(self) -> TokenLaunch {
        let mut launch = TokenLaunch::new(self.chain, self.address);
        launch.creator = self.creator.filter(|c| !c.trim().is_empty());
        launch.name = self.name;
        launch.symbol = self.symbol;
        launch.pool_address = self.pool_address;
        launch
    }
}

/// Assess a token now and store the verdict as a new epoch
///
/// POST /api/v1/assess
pub async fn assess_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AssessRequest>,
) -> EngineResult<Json<AssessmentRecord>> {
    if request.address.trim().is_empty() {
        return Err(EngineError::Validation("address is required".to_string()));
    }

    let launch = request.into_launch();
    tracing::info!(chain = %launch.chain, token = %launch.address, "On-demand assessment requested");

    let record = state.pipeline.process(launch).await?;
    Ok(Json(record))
}

// =============================================================================
// TOKENS API
// =============================================================================

/// Query parameters for recent assessments
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

/// Response for recent assessments
#[derive(Debug, Serialize)]
pub struct RecentResponse {
    pub assessments: Vec<AssessmentRecord>,
    pub total: usize,
}

/// Latest verdicts across all tokens, newest first
///
/// GET /api/v1/tokens/recent
pub async fn recent_assessments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentQuery>,
) -> EngineResult<Json<RecentResponse>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);
    let assessments = state.pipeline.store().recent(limit).await?;
    let total = assessments.len();

    Ok(Json(RecentResponse { assessments, total }))
}

/// Response for a token's history
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub chain: Chain,
    pub address: String,
    /// Every epoch, oldest first
    pub assessments: Vec<AssessmentRecord>,
    /// Incomplete and aborted analyses
    pub failures: Vec<FailureRecord>,
}

/// All assessment epochs for one token
///
/// GET /api/v1/tokens/:chain/:address/history
pub async fn token_history(
    State(state): State<Arc<AppState>>,
    Path((chain, address)): Path<(String, String)>,
) -> EngineResult<Json<HistoryResponse>> {
    let (chain, address) = parse_token_path(&chain, &address)?;
    let store = state.pipeline.store();

    let assessments = store.history(chain, &address).await?;
    let failures = store.failures(chain, &address).await?;
    if assessments.is_empty() && failures.is_empty() {
        return Err(EngineError::NotFound(format!("no assessments for {}:{}", chain, address)));
    }

    Ok(Json(HistoryResponse {
        chain,
        address,
        assessments,
        failures,
    }))
}

/// Latest verdict rendered as plain text
///
/// GET /api/v1/tokens/:chain/:address/report
pub async fn token_report(
    State(state): State<Arc<AppState>>,
    Path((chain, address)): Path<(String, String)>,
) -> EngineResult<Response> {
    let (chain, address) = parse_token_path(&chain, &address)?;

    let record = state
        .pipeline
        .store()
        .latest(chain, &address)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("no assessments for {}:{}", chain, address)))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_report(&record),
    )
        .into_response())
}

/// Parse and normalize the `:chain/:address` path segments
fn parse_token_path(chain: &str, address: &str) -> EngineResult<(Chain, String)> {
    let chain: Chain = chain
        .parse()
        .map_err(|e: crate::error::FetchError| EngineError::Validation(e.to_string()))?;
    let address = chain
        .normalize_address(address)
        .map_err(|e| EngineError::Validation(e.to_string()))?;
    Ok((chain, address))
}
