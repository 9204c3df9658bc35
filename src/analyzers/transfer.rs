//! Transfer-graph analysis
//!
//! Looks for wash trading (few counterparties relative to volume) and rapid
//! A->B->A round trips, and reports holder concentration.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::TransferAnalyzerConfig;
use crate::models::{FactorResult, TransferEvent, TransferPattern};

pub const INSUFFICIENT_SAMPLE_REASON: &str = "insufficient holder sample";

/// Mint source and burn sinks; never counted as holders
const NON_HOLDERS: [&str; 2] = [
    "0x0000000000000000000000000000000000000000",
    "0x000000000000000000000000000000000000dead",
];

fn is_holder(address: &str) -> bool {
    !address.is_empty() && !NON_HOLDERS.contains(&address)
}

/// Count A->B transfers answered by B->A within `window` blocks.
/// Each forward transfer matches at most one return.
fn count_round_trips(events: &[TransferEvent], window: u64) -> usize {
    let mut pending: HashMap<(&str, &str), VecDeque<u64>> = HashMap::new();
    let mut count = 0;

    for event in events {
        let reverse = (event.to.as_str(), event.from.as_str());
        if let Some(blocks) = pending.get_mut(&reverse) {
            while blocks
                .front()
                .is_some_and(|b| event.block.saturating_sub(*b) > window)
            {
                blocks.pop_front();
            }
            if blocks.pop_front().is_some() {
                count += 1;
                continue;
            }
        }
        pending
            .entry((event.from.as_str(), event.to.as_str()))
            .or_default()
            .push_back(event.block);
    }
    count
}

/// Largest net-balance share among holders within the sample
fn max_holder_share(events: &[TransferEvent]) -> f64 {
    let mut balances: HashMap<&str, f64> = HashMap::new();
    for event in events {
        if is_holder(&event.from) {
            *balances.entry(event.from.as_str()).or_default() -= event.amount;
        }
        if is_holder(&event.to) {
            *balances.entry(event.to.as_str()).or_default() += event.amount;
        }
    }
    let positive: Vec<f64> = balances.values().copied().filter(|b| *b > 0.0).collect();
    let total: f64 = positive.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    positive.iter().fold(0.0_f64, |max, b| max.max(b / total))
}

/// Summarize the most recent `max_transfer_history` transfers. `events` must
/// be ordered oldest first.
pub fn analyze_transfers(events: &[TransferEvent], config: &TransferAnalyzerConfig) -> TransferPattern {
    let sample = &events[events.len().saturating_sub(config.max_transfer_history)..];
    let total = sample.len();

    let counterparties: HashSet<&str> = sample
        .iter()
        .flat_map(|e| [e.from.as_str(), e.to.as_str()])
        .filter(|a| is_holder(a))
        .collect();
    let holders: HashSet<&str> = sample
        .iter()
        .map(|e| e.to.as_str())
        .filter(|a| is_holder(a))
        .collect();

    let wash_trade_score = if total >= config.wash_min_transfers && total > 0 {
        let ratio = counterparties.len() as f64 / total as f64;
        if ratio < config.wash_ratio_threshold {
            0.5 + 0.5 * (1.0 - ratio / config.wash_ratio_threshold)
        } else {
            0.0
        }
    } else {
        0.0
    };

    TransferPattern {
        total_transfers_sampled: total,
        unique_counterparties: counterparties.len(),
        unique_holders: holders.len(),
        max_single_holder_share: max_holder_share(sample),
        wash_trade_score,
        rapid_buy_sell_count: count_round_trips(sample, config.rapid_block_window),
    }
}

pub fn score_transfers(pattern: &TransferPattern, config: &TransferAnalyzerConfig) -> FactorResult {
    if pattern.unique_holders < config.min_holders_for_analysis {
        return FactorResult::abstained(config.abstain_score, INSUFFICIENT_SAMPLE_REASON);
    }

    let mut reasons = Vec::new();
    let total = pattern.total_transfers_sampled.max(1) as f64;
    let rapid_ratio = (2.0 * pattern.rapid_buy_sell_count as f64 / total).min(1.0);

    if pattern.wash_trade_score > 0.0 {
        reasons.push(format!(
            "wash trading: {} counterparties across {} transfers",
            pattern.unique_counterparties, pattern.total_transfers_sampled
        ));
    }
    if pattern.rapid_buy_sell_count > 0 {
        reasons.push(format!(
            "{} rapid buy/sell round trips",
            pattern.rapid_buy_sell_count
        ));
    }
    if pattern.max_single_holder_share > config.concentration_warning {
        reasons.push(format!(
            "one holder controls {:.0}% of sampled supply",
            pattern.max_single_holder_share * 100.0
        ));
    }
    if reasons.is_empty() {
        reasons.push(format!(
            "organic transfer pattern across {} holders",
            pattern.unique_holders
        ));
    }

    let score = config.wash_weight * pattern.wash_trade_score + config.rapid_weight * rapid_ratio;
    FactorResult::scored(score, reasons)
}
