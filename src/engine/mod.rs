//! Risk assessment engine for LaunchGuard
//!
//! `RiskEngine::assess` turns one `TokenLaunch` into a `RiskAssessment`;
//! `AssessmentPipeline` adds persistence and notification around it.

mod aggregator;
mod assessor;
mod pipeline;
pub mod report;

pub use aggregator::RiskAggregator;
pub use assessor::{AnalyzerSettings, EngineCacheStats, RiskEngine};
pub use pipeline::AssessmentPipeline;
pub use report::render_report;
