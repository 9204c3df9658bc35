//! LaunchGuard Library
//!
//! Explainable risk scoring for newly launched tokens on EVM chains and
//! Solana. This library exposes core modules for the binary and tests.

pub mod analyzers;
pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod monitoring;
pub mod notifications;
pub mod sources;

// Re-export commonly used types for tests
pub use cache::{CacheKey, Clock, LookupKind, ManualClock, VerificationCache};
pub use config::AppConfig;
pub use db::{AssessmentStore, DbPool, MemoryAssessmentStore, SqliteAssessmentStore};
pub use engine::{AssessmentPipeline, RiskAggregator, RiskEngine};
pub use error::{EngineError, EngineResult, FetchError};
pub use fetcher::RateLimitedFetcher;
pub use models::{Chain, RiskAssessment, RiskLevel, TokenLaunch};
pub use notifications::{CompositeNotifier, Notifier, VerdictEvent};
pub use sources::{ChainDataSource, KnownBadActorRegistry, StaticBadActorRegistry};
