//! Creator reputation scoring

use crate::config::CreatorAnalyzerConfig;
use crate::models::{CreatorProfile, FactorResult, RiskSignal};

pub fn score_creator(profile: &CreatorProfile, config: &CreatorAnalyzerConfig) -> FactorResult {
    if profile.is_known_bad_actor {
        return FactorResult::scored(1.0, vec!["known scammer address".to_string()])
            .with_signal(RiskSignal::KnownScammer);
    }

    let mut score = 0.0;
    let mut reasons = Vec::new();
    let mut burner = false;

    if profile.prior_tx_count < config.min_prior_tx {
        score += config.new_address_penalty;
        burner = true;
        reasons.push(format!(
            "new or burner creator address ({} prior transactions)",
            profile.prior_tx_count
        ));
    }

    if profile.prior_deployment_count > config.serial_deployment_threshold {
        score += config.serial_deployer_penalty;
        reasons.push(format!(
            "serial deployer: {} contracts in {}h",
            profile.prior_deployment_count, config.deployment_window_hours
        ));
    }

    if profile.native_balance < config.dust_balance_threshold {
        score += config.dust_balance_penalty;
        reasons.push(format!(
            "creator holds a dust balance ({:.4})",
            profile.native_balance
        ));
    }

    if reasons.is_empty() {
        reasons.push(format!(
            "established creator ({} prior transactions)",
            profile.prior_tx_count
        ));
    }

    let result = FactorResult::scored(score, reasons);
    if burner {
        result.with_signal(RiskSignal::BurnerCreator)
    } else {
        result
    }
}
