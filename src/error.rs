//! Error types for LaunchGuard
//!
//! `FetchError` is what data sources and the fetcher return. `EngineError` is
//! what the engine, store and API surface. The split matters: callers must be
//! able to tell "could not analyze" apart from "analyzed as safe".

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single external lookup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Network or provider hiccup (timeout, 5xx, dropped connection)
    #[error("transient failure from {provider}: {message}")]
    Transient { provider: String, message: String },

    /// Provider throttling (429 or equivalent)
    #[error("rate limited by {provider}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    /// Lookup target does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input or unsupported request; retrying cannot help
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// Transient failures persisted past the retry budget
    #[error("data unavailable after {attempts} attempts: {last}")]
    DataUnavailable { attempts: u32, last: String },
}

impl FetchError {
    pub fn transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        FetchError::Transient {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn rate_limited(provider: impl Into<String>, retry_after: Option<Duration>) -> Self {
        FetchError::RateLimited {
            provider: provider.into(),
            retry_after,
        }
    }

    /// Whether the fetcher may retry this failure
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient { .. } | FetchError::RateLimited { .. })
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transient { .. } => "transient",
            FetchError::RateLimited { .. } => "rate_limited",
            FetchError::NotFound(_) => "not_found",
            FetchError::Permanent(_) => "permanent",
            FetchError::DataUnavailable { .. } => "data_unavailable",
        }
    }

    /// Classify an HTTP status from an external provider
    pub fn from_status(provider: &str, status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            429 => FetchError::rate_limited(provider, None),
            404 => FetchError::NotFound(format!("{} returned 404", provider)),
            408 | 500..=599 => FetchError::transient(provider, format!("HTTP {}", status)),
            _ => FetchError::Permanent(format!("{} returned HTTP {}: {}", provider, status, body)),
        }
    }

    /// Classify a transport-level reqwest failure
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return FetchError::from_status(provider, status, &err.to_string());
        }
        if err.is_decode() {
            return FetchError::Permanent(format!("{} sent an unreadable response: {}", provider, err));
        }
        FetchError::transient(provider, err.to_string())
    }
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// A data source returned no data
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Provider hiccup that outlived retries at a point where no default exists
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Provider throttling
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Token cannot be analyzed (malformed address, unsupported chain)
    #[error("Permanent failure: {0}")]
    Permanent(String),

    /// Invalid weights or thresholds
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database error
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Bad API input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Analysis abandoned before aggregation
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Failures that abort a token's analysis rather than degrade it
    pub fn is_abort(&self) -> bool {
        matches!(self, EngineError::Permanent(_) | EngineError::Validation(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::DataUnavailable(_) => "data_unavailable",
            EngineError::Transient(_) => "transient",
            EngineError::RateLimited(_) => "rate_limited",
            EngineError::Permanent(_) => "permanent",
            EngineError::Configuration(_) => "configuration",
            EngineError::Storage(_) => "storage",
            EngineError::Validation(_) => "validation",
            EngineError::NotFound(_) => "not_found",
            EngineError::Cancelled(_) => "cancelled",
            EngineError::Internal(_) => "internal",
        }
    }
}

impl From<FetchError> for EngineError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transient { .. } => EngineError::Transient(err.to_string()),
            FetchError::RateLimited { .. } => EngineError::RateLimited(err.to_string()),
            FetchError::NotFound(msg) => EngineError::NotFound(msg),
            FetchError::Permanent(msg) => EngineError::Permanent(msg),
            FetchError::DataUnavailable { .. } => EngineError::DataUnavailable(err.to_string()),
        }
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

/// Error response structure for API
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status_code, status) = match &self {
            EngineError::Permanent(_) | EngineError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "rejected")
            }
            EngineError::NotFound(_) => (StatusCode::NOT_FOUND, "rejected"),
            EngineError::DataUnavailable(_)
            | EngineError::Transient(_)
            | EngineError::RateLimited(_)
            | EngineError::Cancelled(_) => (StatusCode::SERVICE_UNAVAILABLE, "error"),
            EngineError::Configuration(_) | EngineError::Storage(_) | EngineError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "error")
            }
        };

        let error_response = ErrorResponse {
            status,
            reason: self.kind().to_string(),
            details: Some(self.to_string()),
        };

        if status_code.is_server_error() {
            tracing::error!(error_type = %self, status_code = %status_code, "Request error");
        } else {
            tracing::debug!(error_type = %self, status_code = %status_code, "Request rejected");
        }

        (status_code, Json(json!(error_response))).into_response()
    }
}

/// Result type alias for convenience
pub type EngineResult<T> = Result<T, EngineError>;
