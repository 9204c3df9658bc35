//! Assessment Pipeline Integration Tests
//!
//! Tests assess -> persist -> notify:
//! - Rejected launches leave an aborted marker and no verdict
//! - Verdicts below the alert threshold are not delivered
//! - Re-assessment appends a new epoch

use launchguard::db::AssessmentStore;
use launchguard::models::{Chain, FailureKind, RiskLevel};

use crate::support::{engine_with, launch, pipeline_with, MockSocial, MockSource, TOKEN};

const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// A chain with no source is aborted, remembered, and never scored
#[tokio::test]
async fn test_unsupported_chain_aborted() {
    let engine = engine_with(MockSource::safe(Chain::Ethereum), MockSocial::full());
    let mut harness = pipeline_with(engine, RiskLevel::Low);

    let err = harness
        .pipeline
        .process(launch(Chain::Solana, SOL_MINT))
        .await
        .unwrap_err();
    assert!(err.is_abort());

    assert_eq!(harness.store.record_count(), 0);
    let failures = harness.store.all_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::Aborted);
    assert!(harness.store.is_known(Chain::Solana, SOL_MINT).await.unwrap());
    assert!(harness.verdicts.try_recv().is_err());
}

/// A malformed address is aborted with the reason kept
#[tokio::test]
async fn test_malformed_address_aborted() {
    let engine = engine_with(MockSource::safe(Chain::Ethereum), MockSocial::full());
    let harness = pipeline_with(engine, RiskLevel::Low);

    assert!(harness
        .pipeline
        .process(launch(Chain::Ethereum, "0x12"))
        .await
        .is_err());

    let failures = harness.store.all_failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].reason.contains("malformed"));
    assert!(harness.store.latest(Chain::Ethereum, "0x12").await.unwrap().is_none());
}

/// CRITICAL verdicts reach the notifier at min_level HIGH
#[tokio::test]
async fn test_critical_verdict_notified() {
    let engine = engine_with(MockSource::rug(Chain::Ethereum), MockSocial::empty());
    let mut harness = pipeline_with(engine, RiskLevel::High);

    let record = harness
        .pipeline
        .process(launch(Chain::Ethereum, TOKEN))
        .await
        .unwrap();
    assert_eq!(record.assessment.level, RiskLevel::Critical);

    let event = harness.verdicts.try_recv().unwrap();
    assert_eq!(event.level(), RiskLevel::Critical);
    assert_eq!(event.launch.address, TOKEN);
    assert_eq!(event.epoch, 1);
    assert!(event.format_message().contains("CRITICAL"));
}

/// LOW verdicts are stored but not delivered at min_level HIGH
#[tokio::test]
async fn test_low_verdict_not_notified() {
    let engine = engine_with(MockSource::safe(Chain::Ethereum), MockSocial::full());
    let mut harness = pipeline_with(engine, RiskLevel::High);

    let record = harness
        .pipeline
        .process(launch(Chain::Ethereum, TOKEN))
        .await
        .unwrap();
    assert_eq!(record.assessment.level, RiskLevel::Low);
    assert_eq!(harness.store.record_count(), 1);
    assert!(harness.verdicts.try_recv().is_err());
}

/// Assessing the same launch twice keeps both verdicts as epochs 1 and 2
#[tokio::test]
async fn test_reassessment_appends_epoch() {
    let engine = engine_with(MockSource::safe(Chain::Ethereum), MockSocial::full());
    let harness = pipeline_with(engine, RiskLevel::High);

    let first = harness
        .pipeline
        .process(launch(Chain::Ethereum, TOKEN))
        .await
        .unwrap();
    let second = harness
        .pipeline
        .process(launch(Chain::Ethereum, TOKEN))
        .await
        .unwrap();
    assert_eq!(first.epoch, 1);
    assert_eq!(second.epoch, 2);

    let history = harness.store.history(Chain::Ethereum, TOKEN).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, first.id);
    let latest = harness.store.latest(Chain::Ethereum, TOKEN).await.unwrap().unwrap();
    assert_eq!(latest.epoch, 2);
}

/// Mixed-case EVM input is stored under its canonical address
#[tokio::test]
async fn test_address_normalized_before_storage() {
    let engine = engine_with(MockSource::safe(Chain::Ethereum), MockSocial::full());
    let harness = pipeline_with(engine, RiskLevel::High);
    let mixed = "0xABCDEFabcdef0000000000000000000000000001";

    let record = harness
        .pipeline
        .process(launch(Chain::Ethereum, mixed))
        .await
        .unwrap();
    assert_eq!(record.launch.address, mixed.to_ascii_lowercase());
    assert!(harness
        .store
        .is_known(Chain::Ethereum, &mixed.to_ascii_lowercase())
        .await
        .unwrap());
}
