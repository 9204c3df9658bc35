//! Configuration management for LaunchGuard
//!
//! Loads configuration from TOML/YAML files and environment variables.
//! Environment variables override file values. Every scoring constant is
//! exposed here so calibration never needs a code change.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::models::{Chain, FactorName, RiskLevel};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Monitored chains
    #[serde(default = "default_chains")]
    pub chains: Vec<ChainConfig>,
    /// Off-chain provider endpoints
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Factor weights, must sum to 1.0
    #[serde(default)]
    pub weights: FactorWeights,
    /// Score boundaries between levels
    #[serde(default)]
    pub levels: LevelThresholds,
    #[serde(default)]
    pub contract: ContractAnalyzerConfig,
    #[serde(default)]
    pub creator: CreatorAnalyzerConfig,
    #[serde(default)]
    pub liquidity: LiquidityAnalyzerConfig,
    #[serde(default)]
    pub transfer: TransferAnalyzerConfig,
    #[serde(default)]
    pub social: SocialAnalyzerConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Addresses treated as known scammers
    #[serde(default)]
    pub known_bad_actors: Vec<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/launchguard.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Per-chain settings
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain: Chain,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Etherscan-compatible explorer API (EVM only)
    #[serde(default)]
    pub explorer_url: Option<String>,
    #[serde(default)]
    pub explorer_api_key: Option<String>,
    /// Helius API key for enhanced transactions (Solana only)
    #[serde(default)]
    pub helius_api_key: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Blocks scanned per discovery tick (EVM only)
    #[serde(default = "default_max_blocks_per_poll")]
    pub max_blocks_per_poll: u64,
    /// Extra LP locker contracts whose holdings count as locked (EVM only)
    #[serde(default)]
    pub lp_lockers: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    12
}

fn default_max_blocks_per_poll() -> u64 {
    5
}

fn default_chains() -> Vec<ChainConfig> {
    vec![
        ChainConfig {
            chain: Chain::Ethereum,
            enabled: true,
            rpc_url: "https://eth.llamarpc.com".to_string(),
            explorer_url: Some("https://api.etherscan.io/api".to_string()),
            explorer_api_key: None,
            helius_api_key: None,
            poll_interval_secs: 12,
            max_blocks_per_poll: default_max_blocks_per_poll(),
            lp_lockers: Vec::new(),
        },
        ChainConfig {
            chain: Chain::Solana,
            enabled: true,
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            explorer_url: None,
            explorer_api_key: None,
            helius_api_key: None,
            poll_interval_secs: 30,
            max_blocks_per_poll: default_max_blocks_per_poll(),
            lp_lockers: Vec::new(),
        },
    ]
}

/// Off-chain provider endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_dexscreener_url")]
    pub dexscreener_url: String,
    #[serde(default = "default_rugcheck_url")]
    pub rugcheck_url: String,
    #[serde(default = "default_helius_url")]
    pub helius_url: String,
}

fn default_dexscreener_url() -> String {
    "https://api.dexscreener.com".to_string()
}

fn default_rugcheck_url() -> String {
    "https://api.rugcheck.xyz".to_string()
}

fn default_helius_url() -> String {
    "https://api.helius.xyz".to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            dexscreener_url: default_dexscreener_url(),
            rugcheck_url: default_rugcheck_url(),
            helius_url: default_helius_url(),
        }
    }
}

/// Concurrency, throttling and retry settings for external lookups
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// In-flight requests allowed per chain; extra requests queue
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_per_chain: usize,
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Add random jitter to backoff delays
    #[serde(default = "default_true")]
    pub jitter: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Minimum spacing between requests to one provider
    #[serde(default = "default_min_interval_ms")]
    pub default_min_interval_ms: u64,
    /// Per-provider overrides of the minimum spacing
    #[serde(default = "default_provider_intervals")]
    pub provider_min_interval_ms: HashMap<String, u64>,
}

fn default_max_concurrent() -> usize {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_min_interval_ms() -> u64 {
    0
}

fn default_provider_intervals() -> HashMap<String, u64> {
    // Free-tier explorer keys allow 5 req/s, DexScreener 300 req/min
    HashMap::from([
        ("explorer".to_string(), 200),
        ("dexscreener".to_string(), 200),
        ("rugcheck".to_string(), 500),
    ])
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_chain: default_max_concurrent(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: true,
            request_timeout_secs: default_request_timeout(),
            default_min_interval_ms: default_min_interval_ms(),
            provider_min_interval_ms: default_provider_intervals(),
        }
    }
}

/// Verification cache settings
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Contract verification/bytecode results
    #[serde(default = "default_contract_ttl")]
    pub contract_ttl_secs: u64,
    /// Creator address history
    #[serde(default = "default_creator_ttl")]
    pub creator_ttl_secs: u64,
    /// Maximum entries per cache
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_contract_ttl() -> u64 {
    86_400
}

fn default_creator_ttl() -> u64 {
    21_600
}

fn default_cache_capacity() -> usize {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            contract_ttl_secs: default_contract_ttl(),
            creator_ttl_secs: default_creator_ttl(),
            capacity: default_cache_capacity(),
        }
    }
}

/// Factor weights
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FactorWeights {
    pub contract: f64,
    pub creator: f64,
    pub liquidity: f64,
    pub transfer: f64,
    pub social: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            contract: 0.40,
            creator: 0.25,
            liquidity: 0.20,
            transfer: 0.10,
            social: 0.05,
        }
    }
}

impl FactorWeights {
    pub const SUM_TOLERANCE: f64 = 1e-6;

    pub fn weight(&self, factor: FactorName) -> f64 {
        match factor {
            FactorName::Contract => self.contract,
            FactorName::Creator => self.creator,
            FactorName::Liquidity => self.liquidity,
            FactorName::Transfer => self.transfer,
            FactorName::Social => self.social,
        }
    }

    pub fn sum(&self) -> f64 {
        FactorName::ALL.iter().map(|f| self.weight(*f)).sum()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for factor in FactorName::ALL {
            let w = self.weight(factor);
            if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                return Err(ConfigError::Message(format!(
                    "weight for {} must be within [0, 1], got {}",
                    factor, w
                )));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(ConfigError::Message(format!(
                "factor weights must sum to 1.0, got {:.6}",
                sum
            )));
        }
        Ok(())
    }
}

/// Lower bounds of MEDIUM, HIGH and CRITICAL
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LevelThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            medium: 0.4,
            high: 0.6,
            critical: 0.8,
        }
    }
}

impl LevelThresholds {
    pub fn classify(&self, score: f64) -> RiskLevel {
        if score >= self.critical {
            RiskLevel::Critical
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = 0.0 < self.medium && self.medium < self.high && self.high < self.critical;
        if !ordered || self.critical > 1.0 {
            return Err(ConfigError::Message(format!(
                "level thresholds must satisfy 0 < medium < high < critical <= 1, got {} / {} / {}",
                self.medium, self.high, self.critical
            )));
        }
        Ok(())
    }
}

/// Contract factor constants
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContractAnalyzerConfig {
    /// Subtracted when verified source is published
    pub verified_reduction: f64,
    /// Per MINT / HONEYPOT_PATTERN flag
    pub critical_flag_penalty: f64,
    /// Ceiling on the combined critical-flag contribution
    pub critical_flag_cap: f64,
    /// Per PAUSE / BLACKLIST flag
    pub high_flag_penalty: f64,
    /// Per PROXY / OWNER_ONLY_TRANSFER flag
    pub elevated_flag_penalty: f64,
    pub not_renounced_penalty: f64,
    pub large_bytecode_bytes: usize,
    pub large_bytecode_penalty: f64,
    /// Used when contract data cannot be fetched
    pub neutral_score: f64,
}

impl Default for ContractAnalyzerConfig {
    fn default() -> Self {
        Self {
            verified_reduction: 0.2,
            critical_flag_penalty: 0.35,
            critical_flag_cap: 0.7,
            high_flag_penalty: 0.2,
            elevated_flag_penalty: 0.1,
            not_renounced_penalty: 0.15,
            large_bytecode_bytes: 50_000,
            large_bytecode_penalty: 0.05,
            neutral_score: 0.5,
        }
    }
}

/// Creator factor constants
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CreatorAnalyzerConfig {
    /// Below this many prior transactions the creator is a burner
    pub min_prior_tx: u64,
    pub new_address_penalty: f64,
    /// More deployments than this inside the window marks a serial deployer
    pub serial_deployment_threshold: u64,
    pub deployment_window_hours: i64,
    pub serial_deployer_penalty: f64,
    /// Native balance below which the creator counts as dusted
    pub dust_balance_threshold: f64,
    pub dust_balance_penalty: f64,
    pub neutral_score: f64,
}

impl Default for CreatorAnalyzerConfig {
    fn default() -> Self {
        Self {
            min_prior_tx: 5,
            new_address_penalty: 0.4,
            serial_deployment_threshold: 10,
            deployment_window_hours: 24,
            serial_deployer_penalty: 0.3,
            dust_balance_threshold: 0.01,
            dust_balance_penalty: 0.1,
            neutral_score: 0.5,
        }
    }
}

/// Liquidity factor constants
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiquidityAnalyzerConfig {
    /// Native-unit floor for initial liquidity
    pub min_initial_liquidity: f64,
    pub low_liquidity_penalty: f64,
    pub unlocked_penalty: f64,
    /// Score when no pool exists yet
    pub missing_pool_score: f64,
    /// Current/initial ratio below which a drain is reported
    pub drain_warning_ratio: f64,
    /// Share of LP supply that must sit with burn/locker addresses
    pub lock_share_threshold: f64,
}

impl Default for LiquidityAnalyzerConfig {
    fn default() -> Self {
        Self {
            min_initial_liquidity: 0.1,
            low_liquidity_penalty: 0.5,
            unlocked_penalty: 0.3,
            missing_pool_score: 0.3,
            drain_warning_ratio: 0.5,
            lock_share_threshold: 0.9,
        }
    }
}

/// Transfer-pattern factor constants
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferAnalyzerConfig {
    pub max_transfer_history: usize,
    pub min_holders_for_analysis: usize,
    pub abstain_score: f64,
    /// unique_counterparties / total_transfers below this flags wash trading
    pub wash_ratio_threshold: f64,
    pub wash_min_transfers: usize,
    /// Blocks within which A->B then B->A counts as a rapid round trip
    pub rapid_block_window: u64,
    pub wash_weight: f64,
    pub rapid_weight: f64,
    pub concentration_warning: f64,
}

impl Default for TransferAnalyzerConfig {
    fn default() -> Self {
        Self {
            max_transfer_history: 1000,
            min_holders_for_analysis: 5,
            abstain_score: 0.5,
            wash_ratio_threshold: 0.1,
            wash_min_transfers: 50,
            rapid_block_window: 3,
            wash_weight: 0.6,
            rapid_weight: 0.4,
            concentration_warning: 0.8,
        }
    }
}

/// Social factor constants
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SocialAnalyzerConfig {
    pub none_score: f64,
    pub partial_score: f64,
    pub full_score: f64,
    /// Used when the provider has nothing on the token
    pub missing_score: f64,
    /// Report hype-style names and symbols
    pub check_name_patterns: bool,
}

impl Default for SocialAnalyzerConfig {
    fn default() -> Self {
        Self {
            none_score: 0.6,
            partial_score: 0.3,
            full_score: 0.0,
            missing_score: 0.6,
            check_name_patterns: true,
        }
    }
}

/// Verdict notification settings
#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Lowest level that reaches the notifier
    #[serde(default = "default_alert_level")]
    pub min_level: RiskLevel,
    /// Log every alert through tracing
    #[serde(default = "default_true")]
    pub log_alerts: bool,
    /// Minimum gap between repeated alerts for the same token and level
    #[serde(default = "default_repeat_interval")]
    pub repeat_interval_secs: u64,
}

fn default_repeat_interval() -> u64 {
    3600
}

fn default_alert_level() -> RiskLevel {
    RiskLevel::High
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            min_level: default_alert_level(),
            log_alerts: true,
            repeat_interval_secs: default_repeat_interval(),
        }
    }
}

/// Monitoring loop settings
#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// Token assessments running at once per chain
    #[serde(default = "default_max_assessments")]
    pub max_concurrent_assessments: usize,
    /// Time in-flight assessments get to finish after a stop signal
    #[serde(default = "default_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_max_assessments() -> usize {
    4
}

fn default_grace() -> u64 {
    10
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            max_concurrent_assessments: default_max_assessments(),
            shutdown_grace_secs: default_grace(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "data/launchguard.db")?
            .set_default("database.max_connections", 5)?
            // Load from config files (lower priority)
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config/config").required(false))
            // Override with environment variables (highest priority - loaded last)
            // LAUNCHGUARD_SERVER__PORT=8081 -> server.port = 8081
            // LAUNCHGUARD_WEIGHTS__CONTRACT=0.5 -> weights.contract = 0.5
            .add_source(
                Environment::with_prefix("LAUNCHGUARD")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("known_bad_actors"),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration values. Any failure here is fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        self.levels.validate()?;

        if self.fetcher.max_concurrent_per_chain == 0 {
            return Err(ConfigError::Message(
                "fetcher.max_concurrent_per_chain must be at least 1".to_string(),
            ));
        }

        if self.fetcher.base_delay_ms > self.fetcher.max_delay_ms {
            return Err(ConfigError::Message(
                "fetcher.base_delay_ms must not exceed fetcher.max_delay_ms".to_string(),
            ));
        }

        if self.monitoring.max_concurrent_assessments == 0 {
            return Err(ConfigError::Message(
                "monitoring.max_concurrent_assessments must be at least 1".to_string(),
            ));
        }

        if self.cache.capacity == 0 {
            return Err(ConfigError::Message("cache.capacity must be at least 1".to_string()));
        }

        let enabled: Vec<&ChainConfig> = self.enabled_chains().collect();
        if enabled.is_empty() {
            return Err(ConfigError::Message("at least one chain must be enabled".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for chain in &enabled {
            if !seen.insert(chain.chain) {
                return Err(ConfigError::Message(format!(
                    "chain {} is configured more than once",
                    chain.chain
                )));
            }
            if !chain.rpc_url.starts_with("http://") && !chain.rpc_url.starts_with("https://") {
                return Err(ConfigError::Message(format!(
                    "chain {} has an invalid rpc_url: {}",
                    chain.chain, chain.rpc_url
                )));
            }
            if chain.poll_interval_secs == 0 {
                return Err(ConfigError::Message(format!(
                    "chain {} poll_interval_secs must be at least 1",
                    chain.chain
                )));
            }
        }

        let t = &self.transfer;
        if (t.wash_weight + t.rapid_weight - 1.0).abs() > FactorWeights::SUM_TOLERANCE {
            return Err(ConfigError::Message(
                "transfer.wash_weight + transfer.rapid_weight must equal 1.0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn enabled_chains(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.iter().filter(|c| c.enabled)
    }
}
