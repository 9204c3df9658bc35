//! Risk Engine Integration Tests
//!
//! Tests `RiskEngine::assess` end to end over a scripted data source:
//! - Clean launch scores LOW, textbook rug setup escalates to CRITICAL
//! - The reference launch profiles land in the expected bands
//! - Known-scammer creators and honeypot bytecode escalate
//! - Contract lookups are cached and can be invalidated or expire
//! - A failing lookup degrades its factor instead of aborting

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{Duration, Utc};
use launchguard::cache::ManualClock;
use launchguard::error::EngineError;
use launchguard::models::{
    Chain, FactorName, FactorStatus, RiskLevel, RiskSignal, TransferEvent,
};
use launchguard::sources::{DiscoveryCursor, StaticBadActorRegistry};

use crate::support::{
    engine_with, honeypot_bytecode, launch, MockSocial, MockSource, CREATOR, POOL, TOKEN,
};

/// Verified, renounced, established, deep locked liquidity: LOW
#[tokio::test]
async fn test_clean_launch_is_low() {
    let engine = engine_with(MockSource::safe(Chain::Ethereum), MockSocial::full());
    let registry = StaticBadActorRegistry::default();

    let assessment = engine
        .assess(&launch(Chain::Ethereum, TOKEN), &registry)
        .await
        .unwrap();

    assert!(assessment.score < 0.2, "score {}", assessment.score);
    assert_eq!(assessment.level, RiskLevel::Low);
    assert!(assessment.overrides.is_empty());
    assert!(!assessment.is_partial());
    assert_eq!(assessment.factor_scores.len(), 5);
}

/// Retained mint, burner creator and thin unlocked pool together are CRITICAL
#[tokio::test]
async fn test_rug_setup_is_critical() {
    let engine = engine_with(MockSource::rug(Chain::Ethereum), MockSocial::empty());
    let registry = StaticBadActorRegistry::default();

    let assessment = engine
        .assess(&launch(Chain::Ethereum, TOKEN), &registry)
        .await
        .unwrap();

    assert!(assessment.score > 0.5, "score {}", assessment.score);
    assert_eq!(assessment.level, RiskLevel::Critical);
    assert!(assessment.overrides.iter().any(|o| o.starts_with("rug setup")));
    assert!(assessment.signals.contains(&RiskSignal::RetainedMint));
    assert!(assessment.signals.contains(&RiskSignal::BurnerCreator));
    assert!(assessment.signals.contains(&RiskSignal::ThinUnlockedLiquidity));

    let transfer = assessment.factor(FactorName::Transfer).unwrap();
    assert_eq!(transfer.status, FactorStatus::Abstained);
}

/// 200 pool buys spread across 150 distinct counterparties
fn spread_transfers() -> Vec<TransferEvent> {
    (0..200u64)
        .map(|i| TransferEvent {
            from: POOL.to_string(),
            to: format!("0x{:040x}", 0x5000 + i % 149),
            amount: 250.0,
            block: 1_000 + i,
            timestamp: None,
            tx_hash: format!("0x{:064x}", 0x9000 + i),
        })
        .collect()
}

/// Established creator with 500 tx, 5 ETH locked, organic transfers: LOW
#[tokio::test]
async fn test_reference_clean_profile_is_low() {
    let mut source = MockSource::safe(Chain::Ethereum);
    source.history.tx_count = 500;
    source.transfers = spread_transfers();
    if let Some(pool) = source.pool.as_mut() {
        pool.reserve_native = 5.0;
        pool.initial_reserve_native = Some(5.0);
        pool.locked = true;
    }
    let engine = engine_with(source, MockSocial::full());
    let registry = StaticBadActorRegistry::default();

    let assessment = engine
        .assess(&launch(Chain::Ethereum, TOKEN), &registry)
        .await
        .unwrap();

    assert!(assessment.score < 0.2, "score {}", assessment.score);
    assert_eq!(assessment.level, RiskLevel::Low);
    let transfer = assessment.factor(FactorName::Transfer).unwrap();
    assert_eq!(transfer.status, FactorStatus::Scored);
    assert!(transfer.score.abs() < 1e-9, "transfer {}", transfer.score);
}

/// Unverified mint-retaining contract, 2-tx creator, 0.01 ETH unlocked: CRITICAL
#[tokio::test]
async fn test_reference_rug_profile_is_critical() {
    let mut source = MockSource::rug(Chain::Ethereum);
    source.history.tx_count = 2;
    if let Some(pool) = source.pool.as_mut() {
        pool.reserve_native = 0.01;
        pool.initial_reserve_native = Some(0.01);
        pool.locked = false;
        pool.lock_duration_secs = None;
    }
    let engine = engine_with(source, MockSocial::empty());
    let registry = StaticBadActorRegistry::default();

    let assessment = engine
        .assess(&launch(Chain::Ethereum, TOKEN), &registry)
        .await
        .unwrap();

    assert_eq!(assessment.level, RiskLevel::Critical);
    assert!(assessment.signals.contains(&RiskSignal::RetainedMint));
    assert!(assessment.signals.contains(&RiskSignal::BurnerCreator));
    assert!(assessment.signals.contains(&RiskSignal::ThinUnlockedLiquidity));
    let contract = assessment.factor(FactorName::Contract).unwrap();
    // mint 0.35 + not renounced 0.15
    assert!((contract.score - 0.5).abs() < 1e-9, "contract {}", contract.score);
}

/// A flagged creator is CRITICAL and its history is never fetched
#[tokio::test]
async fn test_known_scammer_creator() {
    let source = MockSource::safe(Chain::Ethereum);
    let calls = source.calls.clone();
    let engine = engine_with(source, MockSocial::full());
    let registry = StaticBadActorRegistry::default();
    registry.flag(CREATOR);

    let assessment = engine
        .assess(&launch(Chain::Ethereum, TOKEN), &registry)
        .await
        .unwrap();

    assert_eq!(assessment.level, RiskLevel::Critical);
    assert!(assessment.signals.contains(&RiskSignal::KnownScammer));
    assert_eq!(calls.history.load(Ordering::SeqCst), 0);
}

/// Honeypot bytes in otherwise clean bytecode escalate
#[tokio::test]
async fn test_honeypot_bytecode_is_critical() {
    let mut source = MockSource::safe(Chain::Ethereum);
    source.bytecode = honeypot_bytecode();
    let engine = engine_with(source, MockSocial::full());

    let assessment = engine
        .assess(
            &launch(Chain::Ethereum, TOKEN),
            &StaticBadActorRegistry::default(),
        )
        .await
        .unwrap();

    assert_eq!(assessment.level, RiskLevel::Critical);
    assert!(assessment.overrides[0].contains("honeypot"));
}

/// Repeat assessments reuse cached contract lookups until invalidated
#[tokio::test]
async fn test_contract_lookups_cached() {
    let source = MockSource::safe(Chain::Ethereum);
    let calls = source.calls.clone();
    let engine = engine_with(source, MockSocial::full());
    let registry = StaticBadActorRegistry::default();
    let token = launch(Chain::Ethereum, TOKEN);

    let first = engine.assess(&token, &registry).await.unwrap();
    let second = engine.assess(&token, &registry).await.unwrap();
    assert_eq!(first.score, second.score);
    assert_eq!(calls.bytecode.load(Ordering::SeqCst), 1);
    assert_eq!(calls.source.load(Ordering::SeqCst), 1);
    assert_eq!(calls.history.load(Ordering::SeqCst), 1);
    // Transfers are live data
    assert_eq!(calls.transfers.load(Ordering::SeqCst), 2);
    assert_eq!(engine.cache_stats().bytecode.hits, 1);

    engine.invalidate(Chain::Ethereum, TOKEN);
    engine.assess(&token, &registry).await.unwrap();
    assert_eq!(calls.bytecode.load(Ordering::SeqCst), 2);
}

/// Cached bytecode is refetched once the contract TTL has passed
#[tokio::test]
async fn test_contract_cache_expires() {
    let source = MockSource::safe(Chain::Ethereum);
    let calls = source.calls.clone();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let engine = engine_with(source, MockSocial::full()).with_clock(clock.clone());
    let registry = StaticBadActorRegistry::default();
    let token = launch(Chain::Ethereum, TOKEN);

    engine.assess(&token, &registry).await.unwrap();
    clock.advance(Duration::hours(12));
    engine.assess(&token, &registry).await.unwrap();
    assert_eq!(calls.bytecode.load(Ordering::SeqCst), 1);

    clock.advance(Duration::hours(13));
    engine.assess(&token, &registry).await.unwrap();
    assert_eq!(calls.bytecode.load(Ordering::SeqCst), 2);
}

/// A transfer provider that keeps failing degrades only the transfer factor
#[tokio::test]
async fn test_failing_lookup_degrades_factor() {
    let mut source = MockSource::safe(Chain::Ethereum);
    source.fail_transfers = true;
    let calls = source.calls.clone();
    let engine = engine_with(source, MockSocial::full());

    let assessment = engine
        .assess(
            &launch(Chain::Ethereum, TOKEN),
            &StaticBadActorRegistry::default(),
        )
        .await
        .unwrap();

    // 1 + max_retries(2)
    assert_eq!(calls.transfers.load(Ordering::SeqCst), 3);
    assert!(assessment.is_partial());
    let transfer = assessment.factor(FactorName::Transfer).unwrap();
    assert_eq!(transfer.status, FactorStatus::Degraded);
    assert!(transfer.contributing_reasons[0].contains("unavailable"));
    assert_eq!(
        assessment.factor(FactorName::Contract).unwrap().status,
        FactorStatus::Scored
    );
}

/// Input errors abort instead of producing a verdict
#[tokio::test]
async fn test_input_errors_abort() {
    let engine = engine_with(MockSource::safe(Chain::Ethereum), MockSocial::full());
    let registry = StaticBadActorRegistry::default();

    let malformed = engine
        .assess(&launch(Chain::Ethereum, "0xnot-an-address"), &registry)
        .await
        .unwrap_err();
    assert!(matches!(malformed, EngineError::Permanent(_)));

    let unsupported = engine
        .assess(&launch(Chain::Base, TOKEN), &registry)
        .await
        .unwrap_err();
    assert!(unsupported.to_string().contains("unsupported chain"));
}

/// Discovery goes through the source and advances the cursor
#[tokio::test]
async fn test_discovery_dedupes_across_polls() {
    let batch = vec![
        launch(Chain::Ethereum, TOKEN),
        launch(Chain::Ethereum, "0x4444444444444444444444444444444444444444"),
    ];
    let source = MockSource::safe(Chain::Ethereum).with_discovery(vec![batch.clone(), batch]);
    let engine = engine_with(source, MockSocial::full());
    let mut cursor = DiscoveryCursor::new();

    let first = engine.discover(Chain::Ethereum, &mut cursor).await.unwrap();
    assert_eq!(first.len(), 2);
    let second = engine.discover(Chain::Ethereum, &mut cursor).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(cursor.seen_count(), 2);
}
