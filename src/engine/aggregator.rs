//! Weighted combination of factor results into a verdict

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{FactorWeights, LevelThresholds};
use crate::error::EngineResult;
use crate::models::{
    FactorName, FactorResult, FactorScore, FactorStatus, RiskAssessment, RiskLevel, RiskSignal,
};

const MISSING_FACTOR_SCORE: f64 = 0.5;

/// Combines the five factor results under fixed weights.
///
/// Pure: the same factor results always produce the same assessment.
#[derive(Debug, Clone)]
pub struct RiskAggregator {
    weights: FactorWeights,
    thresholds: LevelThresholds,
}

impl RiskAggregator {
    /// Fails with `Configuration` on weights that do not sum to 1.0 or
    /// thresholds that are not strictly increasing.
    pub fn new(weights: FactorWeights, thresholds: LevelThresholds) -> EngineResult<Self> {
        weights.validate()?;
        thresholds.validate()?;
        Ok(Self { weights, thresholds })
    }

    pub fn weights(&self) -> &FactorWeights {
        &self.weights
    }

    pub fn thresholds(&self) -> &LevelThresholds {
        &self.thresholds
    }

    /// Factors ordered by weight, heaviest first; ties keep factor order
    fn ordered_factors(&self) -> Vec<FactorName> {
        let mut names = FactorName::ALL.to_vec();
        names.sort_by(|a, b| {
            self.weights
                .weight(*b)
                .total_cmp(&self.weights.weight(*a))
                .then(a.cmp(b))
        });
        names
    }

    pub fn aggregate(&self, factors: &BTreeMap<FactorName, FactorResult>) -> RiskAssessment {
        let mut factor_scores = BTreeMap::new();
        let mut contributing_reasons = Vec::new();
        let mut signals = BTreeSet::new();
        let mut score = 0.0;

        for name in self.ordered_factors() {
            let weight = self.weights.weight(name);
            let (factor_score, status, reasons) = match factors.get(&name) {
                Some(result) => {
                    // Social presence is too weak a signal to escalate on
                    if name != FactorName::Social {
                        signals.extend(result.signals.iter().copied());
                    }
                    (result.score.clamp(0.0, 1.0), result.status, result.reasons.clone())
                }
                None => (
                    MISSING_FACTOR_SCORE,
                    FactorStatus::Degraded,
                    vec!["factor result missing, neutral score used".to_string()],
                ),
            };

            score += factor_score * weight;
            contributing_reasons.extend(reasons.iter().map(|r| format!("{}: {}", name, r)));
            factor_scores.insert(
                name,
                FactorScore {
                    score: factor_score,
                    weight,
                    status,
                    contributing_reasons: reasons,
                },
            );
        }

        let score = score.clamp(0.0, 1.0);
        let overrides = escalations(&signals);
        let level = if overrides.is_empty() {
            self.thresholds.classify(score)
        } else {
            RiskLevel::Critical
        };

        RiskAssessment {
            score,
            level,
            factor_scores,
            contributing_reasons,
            overrides,
            signals,
        }
    }
}

/// Signals that are absolute rather than averaged
fn escalations(signals: &BTreeSet<RiskSignal>) -> Vec<String> {
    let mut overrides = Vec::new();
    if signals.contains(&RiskSignal::KnownScammer) {
        overrides.push("creator is a known scammer".to_string());
    }
    if signals.contains(&RiskSignal::HoneypotPattern) {
        overrides.push("honeypot pattern in contract".to_string());
    }
    let rug_setup = [
        RiskSignal::RetainedMint,
        RiskSignal::BurnerCreator,
        RiskSignal::ThinUnlockedLiquidity,
    ];
    if rug_setup.iter().all(|s| signals.contains(s)) {
        overrides.push(
            "rug setup: retained mint authority, burner creator and thin unlocked liquidity"
                .to_string(),
        );
    }
    overrides
}
