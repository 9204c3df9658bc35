//! Risk verdicts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::TokenLaunch;

/// Final risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            "CRITICAL" => Ok(RiskLevel::Critical),
            other => Err(format!("unknown risk level: {}", other)),
        }
    }
}

/// The five risk dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorName {
    Contract,
    Creator,
    Liquidity,
    Transfer,
    Social,
}

impl FactorName {
    pub const ALL: [FactorName; 5] = [
        FactorName::Contract,
        FactorName::Creator,
        FactorName::Liquidity,
        FactorName::Transfer,
        FactorName::Social,
    ];
}

impl fmt::Display for FactorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FactorName::Contract => "contract",
            FactorName::Creator => "creator",
            FactorName::Liquidity => "liquidity",
            FactorName::Transfer => "transfer",
            FactorName::Social => "social",
        };
        f.write_str(name)
    }
}

/// How a factor score was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorStatus {
    /// Scored from complete data
    Scored,
    /// Analyzer declined to judge (sample too small)
    Abstained,
    /// Data could not be fetched; a default score stands in
    Degraded,
}

/// Discrete signals the aggregator treats as absolute or combines across factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSignal {
    KnownScammer,
    HoneypotPattern,
    RetainedMint,
    BurnerCreator,
    ThinUnlockedLiquidity,
}

/// Output of one factor analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorResult {
    pub score: f64,
    pub reasons: Vec<String>,
    pub status: FactorStatus,
    #[serde(default)]
    pub signals: BTreeSet<RiskSignal>,
}

impl FactorResult {
    pub fn scored(score: f64, reasons: Vec<String>) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            reasons,
            status: FactorStatus::Scored,
            signals: BTreeSet::new(),
        }
    }

    pub fn abstained(score: f64, reason: impl Into<String>) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            reasons: vec![reason.into()],
            status: FactorStatus::Abstained,
            signals: BTreeSet::new(),
        }
    }

    pub fn degraded(score: f64, reason: impl Into<String>) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            reasons: vec![reason.into()],
            status: FactorStatus::Degraded,
            signals: BTreeSet::new(),
        }
    }

    pub fn with_signal(mut self, signal: RiskSignal) -> Self {
        self.signals.insert(signal);
        self
    }
}

/// A factor's contribution inside a finished assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub score: f64,
    pub weight: f64,
    pub status: FactorStatus,
    pub contributing_reasons: Vec<String>,
}

/// Explainable verdict for one token at one analysis epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub level: RiskLevel,
    pub factor_scores: BTreeMap<FactorName, FactorScore>,
    /// All factor reasons, heaviest factor first
    pub contributing_reasons: Vec<String>,
    /// Rules that forced the level above the weighted score
    pub overrides: Vec<String>,
    pub signals: BTreeSet<RiskSignal>,
}

impl RiskAssessment {
    pub fn factor(&self, name: FactorName) -> Option<&FactorScore> {
        self.factor_scores.get(&name)
    }

    /// True when any factor ran on a default instead of real data
    pub fn is_partial(&self) -> bool {
        self.factor_scores
            .values()
            .any(|f| f.status == FactorStatus::Degraded)
    }
}

/// A persisted assessment. Records are append-only: re-analysis adds a
/// new epoch and never rewrites an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: Uuid,
    pub launch: TokenLaunch,
    pub epoch: u32,
    pub assessed_at: DateTime<Utc>,
    pub assessment: RiskAssessment,
}

/// Why an analysis did not produce a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Abandoned mid-flight (shutdown, cancellation)
    Incomplete,
    /// Could not be analyzed at all (malformed address, unsupported chain)
    Aborted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Incomplete => f.write_str("incomplete"),
            FailureKind::Aborted => f.write_str("aborted"),
        }
    }
}

/// Marker recorded instead of a verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub launch: TokenLaunch,
    pub kind: FailureKind,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}
