//! Liquidity pool scoring

use crate::config::LiquidityAnalyzerConfig;
use crate::models::{FactorResult, LiquidityState, RiskSignal};

pub const NO_POOL_REASON: &str = "no liquidity pool detected at analysis time";

/// Score pool depth and lock status. `None` means no pool exists yet.
pub fn score_liquidity(
    state: Option<&LiquidityState>,
    native_symbol: &str,
    config: &LiquidityAnalyzerConfig,
) -> FactorResult {
    let Some(state) = state else {
        return FactorResult::abstained(config.missing_pool_score, NO_POOL_REASON);
    };

    let mut score = 0.0;
    let mut reasons = Vec::new();

    let thin = state.initial_liquidity_native < config.min_initial_liquidity;
    if thin {
        score += config.low_liquidity_penalty;
        reasons.push(format!(
            "thin initial liquidity: {:.4} {} (floor {})",
            state.initial_liquidity_native, native_symbol, config.min_initial_liquidity
        ));
    } else {
        reasons.push(format!(
            "initial liquidity {:.4} {}",
            state.initial_liquidity_native, native_symbol
        ));
    }

    if state.is_locked {
        match state.lock_duration_seconds {
            Some(secs) => reasons.push(format!("liquidity locked for {} days", secs / 86_400)),
            None => reasons.push("liquidity locked or burned".to_string()),
        }
    } else {
        score += config.unlocked_penalty;
        reasons.push("liquidity not locked".to_string());
    }

    if state.initial_liquidity_native > 0.0 {
        let ratio = state.current_liquidity_native / state.initial_liquidity_native;
        if ratio < config.drain_warning_ratio {
            reasons.push(format!(
                "liquidity down {:.0}% since launch",
                (1.0 - ratio) * 100.0
            ));
        }
    }

    let result = FactorResult::scored(score, reasons);
    if thin && !state.is_locked {
        result.with_signal(RiskSignal::ThinUnlockedLiquidity)
    } else {
        result
    }
}
