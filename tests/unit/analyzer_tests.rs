//! Factor Analyzer Unit Tests
//!
//! Tests the analyzers on realistic evidence:
//! - SPL mint authorities mapped to contract flags
//! - Verified source with self-destruct and owner gating
//! - Critical penalty cap
//! - Wash trading over the most recent transfers
//! - Serial deployers and liquidity drains

use chrono::{Duration, Utc};
use solana_sdk::pubkey::Pubkey;

use launchguard::analyzers::{
    analyze_transfers, detect_signals, score_contract, score_creator, score_liquidity,
    score_transfers,
};
use launchguard::config::{
    ContractAnalyzerConfig, CreatorAnalyzerConfig, LiquidityAnalyzerConfig, TransferAnalyzerConfig,
};
use launchguard::models::{
    AddressHistory, ChainFamily, CreatorProfile, FactorStatus, FunctionFlag, LiquidityState,
    OwnerStatus, RiskSignal, SourceInfo, TransferEvent,
};

/// 82-byte SPL mint account
fn spl_mint(mint_authority: Option<Pubkey>, freeze_authority: Option<Pubkey>) -> Vec<u8> {
    let mut data = Vec::with_capacity(82);
    let push_option = |data: &mut Vec<u8>, key: Option<Pubkey>| match key {
        Some(key) => {
            data.extend_from_slice(&1u32.to_le_bytes());
            data.extend_from_slice(key.as_ref());
        }
        None => data.extend_from_slice(&[0u8; 36]),
    };
    push_option(&mut data, mint_authority);
    data.extend_from_slice(&1_000_000_000u64.to_le_bytes());
    data.push(9);
    data.push(1);
    push_option(&mut data, freeze_authority);
    data
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// A mint that keeps both authorities can inflate supply and freeze holders
#[test]
fn test_spl_mint_with_authorities() {
    let authority = Pubkey::new_from_array([7u8; 32]);
    let data = spl_mint(Some(authority), Some(authority));

    let signals = detect_signals(ChainFamily::Solana, &data, None, &OwnerStatus::Unknown);
    assert!(signals.has(FunctionFlag::Mint));
    assert!(signals.has(FunctionFlag::Blacklist));
    assert!(!signals.ownership_renounced);

    let result = score_contract(&signals, &ContractAnalyzerConfig::default());
    // mint 0.35 + freeze 0.2 + not renounced 0.15
    assert!(approx(result.score, 0.70));
    assert!(result.signals.contains(&RiskSignal::RetainedMint));
}

/// A mint with both authorities revoked scores clean
#[test]
fn test_spl_mint_revoked() {
    let data = spl_mint(None, None);

    let signals = detect_signals(ChainFamily::Solana, &data, None, &OwnerStatus::Unknown);
    assert!(signals.detected_functions.is_empty());
    assert!(signals.ownership_renounced);

    let result = score_contract(&signals, &ContractAnalyzerConfig::default());
    assert!(approx(result.score, 0.0));
    assert!(result.signals.is_empty());
}

/// Verified source with an owner-only selfdestruct and no renounce path
#[test]
fn test_verified_source_with_self_destruct() {
    let source = SourceInfo {
        verified: true,
        source_code: Some(
            r#"
            contract Vault {
                address owner;
                modifier onlyOwner() { require(msg.sender == owner); _; }
                function close() external onlyOwner { selfdestruct(payable(owner)); }
            }
            "#
            .to_string(),
        ),
        contract_name: Some("Vault".to_string()),
        proxy: false,
        implementation: None,
    };

    let signals = detect_signals(ChainFamily::Evm, &[0x60, 0x80], Some(&source), &OwnerStatus::Unknown);
    assert!(signals.is_verified);
    assert!(signals.self_destruct);
    assert!(!signals.ownership_renounced);

    let result = score_contract(&signals, &ContractAnalyzerConfig::default());
    // -0.2 verified + 0.35 self-destruct + 0.15 not renounced
    assert!(approx(result.score, 0.30));
    assert!(result.reasons.iter().any(|r| r.contains("self-destruct")));
}

/// Critical penalties stop adding up at the cap
#[test]
fn test_critical_penalty_capped() {
    let source = SourceInfo {
        verified: false,
        source_code: Some("function mint(address to) external { } function kill() { selfdestruct(owner); }".to_string()),
        ..Default::default()
    };
    let mut code = vec![0x60, 0x80];
    code.extend_from_slice(&[0x63, 0x91, 0x3d, 0x29, 0x14]);

    let signals = detect_signals(
        ChainFamily::Evm,
        &code,
        Some(&source),
        &OwnerStatus::Owned("0x2222222222222222222222222222222222222222".to_string()),
    );
    assert!(signals.has(FunctionFlag::Mint));
    assert!(signals.has(FunctionFlag::HoneypotPattern));
    assert!(signals.self_destruct);

    let result = score_contract(&signals, &ContractAnalyzerConfig::default());
    // min(3 x 0.35, 0.7) + 0.15 not renounced
    assert!(approx(result.score, 0.85));
    assert!(result.signals.contains(&RiskSignal::HoneypotPattern));
}

fn transfer(from: &str, to: &str, block: u64) -> TransferEvent {
    TransferEvent {
        from: from.to_string(),
        to: to.to_string(),
        amount: 100.0,
        block,
        timestamp: None,
        tx_hash: format!("0x{:x}", block),
    }
}

/// Sixty transfers circulating among five wallets reads as wash trading
#[test]
fn test_ring_transfers_flagged_as_wash() {
    let wallets = ["0xa1", "0xa2", "0xa3", "0xa4", "0xa5"];
    let events: Vec<TransferEvent> = (0..60)
        .map(|i| transfer(wallets[i % 5], wallets[(i + 1) % 5], i as u64 * 10))
        .collect();
    let config = TransferAnalyzerConfig::default();

    let pattern = analyze_transfers(&events, &config);
    assert_eq!(pattern.unique_counterparties, 5);
    assert_eq!(pattern.unique_holders, 5);
    assert_eq!(pattern.rapid_buy_sell_count, 0);
    // ratio 5/60 against threshold 0.1
    let expected_wash = 0.5 + 0.5 * (1.0 - (5.0 / 60.0) / 0.1);
    assert!(approx(pattern.wash_trade_score, expected_wash));

    let result = score_transfers(&pattern, &config);
    assert_eq!(result.status, FactorStatus::Scored);
    assert!(approx(result.score, 0.6 * expected_wash));
    assert!(result.reasons.iter().any(|r| r.contains("wash trading")));
}

/// Immediate back-and-forth transfers count as round trips
#[test]
fn test_ping_pong_counts_round_trips() {
    let mut events = Vec::new();
    for (i, holder) in ["0xb1", "0xb2", "0xb3", "0xb4", "0xb5"].iter().enumerate() {
        let block = i as u64 * 100;
        events.push(transfer("0xpool", holder, block));
        events.push(transfer(holder, "0xpool", block + 1));
    }
    let config = TransferAnalyzerConfig::default();

    let pattern = analyze_transfers(&events, &config);
    assert!(pattern.rapid_buy_sell_count >= 5);

    let result = score_transfers(&pattern, &config);
    assert!(result.score > 0.0);
    assert!(result.reasons.iter().any(|r| r.contains("round trips")));
}

/// Deployments inside the window make a serial deployer; older ones do not count
#[test]
fn test_serial_deployer_window() {
    let now = Utc::now();
    let mut deployments: Vec<_> = (1..=12).map(|h| now - Duration::hours(h)).collect();
    deployments.extend((1..=20).map(|d| now - Duration::days(3 + d)));
    let history = AddressHistory {
        tx_count: 400,
        first_seen: Some(now - Duration::days(90)),
        balance_native: 3.0,
        deployment_timestamps: deployments,
    };
    let config = CreatorAnalyzerConfig::default();

    let profile = CreatorProfile::from_history("0xdeployer", &history, false, Duration::hours(24), now);
    assert_eq!(profile.prior_deployment_count, 12);

    let result = score_creator(&profile, &config);
    assert!(approx(result.score, 0.3));
    assert!(!result.signals.contains(&RiskSignal::BurnerCreator));
}

/// A pool drained below half its launch depth is reported but not scored
#[test]
fn test_liquidity_drain_reported() {
    let state = LiquidityState {
        initial_liquidity_native: 10.0,
        current_liquidity_native: 2.0,
        is_locked: true,
        lock_duration_seconds: Some(180 * 86_400),
    };

    let result = score_liquidity(Some(&state), "ETH", &LiquidityAnalyzerConfig::default());
    assert!(approx(result.score, 0.0));
    assert!(result.reasons.iter().any(|r| r.contains("down 80%")));
    assert!(result.reasons.iter().any(|r| r.contains("180 days")));
}

/// Only the most recent transfers are sampled when history exceeds the limit
#[test]
fn test_sample_keeps_recent_tail() {
    let mut events: Vec<TransferEvent> = (0..10u64)
        .map(|i| transfer("0xpool", &format!("0xc{}", i), i))
        .collect();
    for i in 0..10u64 {
        let (from, to) = if i % 2 == 0 { ("0xa", "0xb") } else { ("0xb", "0xa") };
        events.push(transfer(from, to, 100 + i));
    }
    let config = TransferAnalyzerConfig {
        max_transfer_history: 10,
        ..Default::default()
    };

    let pattern = analyze_transfers(&events, &config);
    assert_eq!(pattern.total_transfers_sampled, 10);
    assert_eq!(pattern.unique_holders, 2);
    assert_eq!(pattern.rapid_buy_sell_count, 5);
}
