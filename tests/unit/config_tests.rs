//! Configuration Unit Tests
//!
//! Tests that configuration is parsed with defaults filled in and that
//! validation rejects settings the engine cannot run with.

use config::{Config, File, FileFormat};
use launchguard::config::{AppConfig, FactorWeights, LevelThresholds};
use launchguard::models::{Chain, RiskLevel};

fn parse(toml: &str) -> AppConfig {
    Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap()
}

const MINIMAL: &str = r#"
[[chains]]
chain = "base"
rpc_url = "https://mainnet.base.org"
explorer_url = "https://api.basescan.org/api"
"#;

/// Omitted sections fall back to their defaults
#[test]
fn test_minimal_config_fills_defaults() {
    let config = parse(MINIMAL);

    assert_eq!(config.chains.len(), 1);
    assert_eq!(config.chains[0].chain, Chain::Base);
    assert!(config.chains[0].enabled);
    assert_eq!(config.weights, FactorWeights::default());
    assert_eq!(config.levels, LevelThresholds::default());
    assert_eq!(config.fetcher.max_retries, 3);
    assert_eq!(config.cache.contract_ttl_secs, 86_400);
    assert_eq!(config.alerts.min_level, RiskLevel::High);
    assert!(config.validate().is_ok());
}

/// Analyzer constants are overridable one field at a time
#[test]
fn test_partial_analyzer_override() {
    let config = parse(&format!(
        "{}\n[creator]\nmin_prior_tx = 20\n\n[liquidity]\nmin_initial_liquidity = 1.5\n",
        MINIMAL
    ));

    assert_eq!(config.creator.min_prior_tx, 20);
    assert!((config.creator.new_address_penalty - 0.4).abs() < 1e-9);
    assert!((config.liquidity.min_initial_liquidity - 1.5).abs() < 1e-9);
    assert!((config.liquidity.unlocked_penalty - 0.3).abs() < 1e-9);
}

/// Weights that do not sum to 1.0 stop startup
#[test]
fn test_weight_sum_rejected() {
    let config = parse(&format!(
        "{}\n[weights]\ncontract = 0.5\ncreator = 0.25\nliquidity = 0.2\ntransfer = 0.1\nsocial = 0.05\n",
        MINIMAL
    ));
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("sum to 1.0"));
}

/// Level thresholds must be strictly increasing
#[test]
fn test_threshold_order_rejected() {
    let config = parse(&format!(
        "{}\n[levels]\nmedium = 0.5\nhigh = 0.5\ncritical = 0.8\n",
        MINIMAL
    ));
    assert!(config.validate().is_err());
}

/// Zero concurrency would deadlock the fetcher
#[test]
fn test_zero_concurrency_rejected() {
    let mut config = parse(MINIMAL);
    config.fetcher.max_concurrent_per_chain = 0;
    assert!(config.validate().is_err());

    let mut config = parse(MINIMAL);
    config.monitoring.max_concurrent_assessments = 0;
    assert!(config.validate().is_err());
}

/// RPC endpoints must be http(s) URLs
#[test]
fn test_malformed_rpc_url_rejected() {
    let config = parse(
        r#"
[[chains]]
chain = "ethereum"
rpc_url = "localhost:8545"
"#,
    );
    assert!(config.validate().is_err());
}

/// A chain may only be configured once
#[test]
fn test_duplicate_chain_rejected() {
    let config = parse(&format!("{}{}", MINIMAL, MINIMAL));
    assert!(config.validate().is_err());
}

/// Disabled chains do not count towards the enabled set
#[test]
fn test_disabled_chain_skipped() {
    let config = parse(&format!(
        "{}\n[[chains]]\nchain = \"solana\"\nenabled = false\nrpc_url = \"https://api.mainnet-beta.solana.com\"\n",
        MINIMAL
    ));
    let enabled: Vec<Chain> = config.enabled_chains().map(|c| c.chain).collect();
    assert_eq!(enabled, vec![Chain::Base]);
}
