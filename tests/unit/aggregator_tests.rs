//! Risk Aggregator Unit Tests
//!
//! Tests the weighted combination of factor results:
//! - Score bounds and determinism over a grid of factor scores
//! - Monotonicity in every factor
//! - Absolute overrides (known scammer, honeypot)

use std::collections::BTreeMap;

use launchguard::config::{FactorWeights, LevelThresholds};
use launchguard::models::{FactorName, FactorResult, RiskLevel, RiskSignal};
use launchguard::RiskAggregator;

const GRID: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

fn aggregator() -> RiskAggregator {
    RiskAggregator::new(FactorWeights::default(), LevelThresholds::default()).unwrap()
}

fn factors(scores: [f64; 5]) -> BTreeMap<FactorName, FactorResult> {
    FactorName::ALL
        .iter()
        .zip(scores)
        .map(|(name, score)| (*name, FactorResult::scored(score, vec![format!("{} scored", name)])))
        .collect()
}

/// Every combination of grid scores: 5 factors x 5 values
fn grid() -> impl Iterator<Item = [f64; 5]> {
    (0..GRID.len().pow(5)).map(|mut i| {
        let mut scores = [0.0; 5];
        for slot in scores.iter_mut() {
            *slot = GRID[i % GRID.len()];
            i /= GRID.len();
        }
        scores
    })
}

/// Aggregate score stays inside [0, 1] and the level matches the thresholds
#[test]
fn test_score_bounded_and_level_consistent() {
    let agg = aggregator();
    let thresholds = LevelThresholds::default();

    for scores in grid() {
        let assessment = agg.aggregate(&factors(scores));
        assert!(
            (0.0..=1.0).contains(&assessment.score),
            "score {} out of range for {:?}",
            assessment.score,
            scores
        );
        assert_eq!(assessment.level, thresholds.classify(assessment.score));
        assert!(assessment.overrides.is_empty());
    }
}

/// Same inputs, same assessment
#[test]
fn test_aggregation_is_deterministic() {
    let agg = aggregator();
    for scores in grid().step_by(7) {
        let input = factors(scores);
        assert_eq!(agg.aggregate(&input), agg.aggregate(&input));
    }
}

/// Raising any single factor never lowers the aggregate score
#[test]
fn test_score_monotonic_in_each_factor() {
    let agg = aggregator();
    for scores in grid().step_by(11) {
        let base = agg.aggregate(&factors(scores)).score;
        for i in 0..5 {
            let mut raised = scores;
            raised[i] = (raised[i] + 0.25).min(1.0);
            let score = agg.aggregate(&factors(raised)).score;
            assert!(score + 1e-12 >= base, "raising factor {} lowered score", i);
        }
    }
}

/// Out-of-range factor scores are clamped before weighting
#[test]
fn test_factor_scores_clamped() {
    let mut input = factors([0.0; 5]);
    input.get_mut(&FactorName::Contract).unwrap().score = 3.0;
    let assessment = aggregator().aggregate(&input);
    assert!((assessment.score - 0.4).abs() < 1e-9);
}

/// A known scammer forces CRITICAL no matter how clean the rest looks
#[test]
fn test_known_scammer_overrides_low_score() {
    let mut input = factors([0.0; 5]);
    input.insert(
        FactorName::Creator,
        FactorResult::scored(1.0, vec!["known scammer address".to_string()])
            .with_signal(RiskSignal::KnownScammer),
    );

    let assessment = aggregator().aggregate(&input);
    assert!(assessment.score < 0.4);
    assert_eq!(assessment.level, RiskLevel::Critical);
    assert_eq!(assessment.overrides.len(), 1);
    assert!(assessment.signals.contains(&RiskSignal::KnownScammer));
}

/// A honeypot pattern forces CRITICAL
#[test]
fn test_honeypot_overrides_low_score() {
    let mut input = factors([0.0; 5]);
    input.insert(
        FactorName::Contract,
        FactorResult::scored(0.35, vec![]).with_signal(RiskSignal::HoneypotPattern),
    );

    let assessment = aggregator().aggregate(&input);
    assert_eq!(assessment.level, RiskLevel::Critical);
    assert!(assessment.overrides[0].contains("honeypot"));
}

/// Custom thresholds move the level boundaries
#[test]
fn test_custom_thresholds() {
    let strict = RiskAggregator::new(
        FactorWeights::default(),
        LevelThresholds {
            medium: 0.1,
            high: 0.2,
            critical: 0.3,
        },
    )
    .unwrap();

    let assessment = strict.aggregate(&factors([0.25; 5]));
    assert_eq!(assessment.level, RiskLevel::High);
}
