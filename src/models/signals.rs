//! Raw and derived risk signals
//!
//! Raw types are what a `ChainDataSource` returns; derived types
//! (`ContractSignals`, `CreatorProfile`, `LiquidityState`, `TransferPattern`,
//! `SocialSignals`) are what the factor analyzers score.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Dangerous capability detected in a token contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionFlag {
    Mint,
    Burn,
    Pause,
    Blacklist,
    Proxy,
    OwnerOnlyTransfer,
    HoneypotPattern,
}

/// How much a flag contributes to the contract factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagSeverity {
    Critical,
    High,
    Elevated,
    Informational,
}

impl FunctionFlag {
    pub fn severity(&self) -> FlagSeverity {
        match self {
            FunctionFlag::Mint | FunctionFlag::HoneypotPattern => FlagSeverity::Critical,
            FunctionFlag::Pause | FunctionFlag::Blacklist => FlagSeverity::High,
            FunctionFlag::Proxy | FunctionFlag::OwnerOnlyTransfer => FlagSeverity::Elevated,
            FunctionFlag::Burn => FlagSeverity::Informational,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            FunctionFlag::Mint => "owner can mint new supply",
            FunctionFlag::Burn => "burn function present",
            FunctionFlag::Pause => "transfers can be paused",
            FunctionFlag::Blacklist => "holders can be blacklisted or frozen",
            FunctionFlag::Proxy => "upgradeable proxy, logic can be swapped",
            FunctionFlag::OwnerOnlyTransfer => "owner controls trading or fees",
            FunctionFlag::HoneypotPattern => "honeypot pattern, selling may be blocked",
        }
    }
}

impl fmt::Display for FunctionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FunctionFlag::Mint => "MINT",
            FunctionFlag::Burn => "BURN",
            FunctionFlag::Pause => "PAUSE",
            FunctionFlag::Blacklist => "BLACKLIST",
            FunctionFlag::Proxy => "PROXY",
            FunctionFlag::OwnerOnlyTransfer => "OWNER_ONLY_TRANSFER",
            FunctionFlag::HoneypotPattern => "HONEYPOT_PATTERN",
        };
        f.write_str(name)
    }
}

/// Explorer verification data for a contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub verified: bool,
    pub source_code: Option<String>,
    pub contract_name: Option<String>,
    pub proxy: bool,
    pub implementation: Option<String>,
}

/// Ownership state of a token contract or mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "owner", rename_all = "lowercase")]
pub enum OwnerStatus {
    Renounced,
    Owned(String),
    Unknown,
}

/// Contract signals derived from source, bytecode and ownership
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractSignals {
    pub is_verified: bool,
    pub source_available: bool,
    pub detected_functions: BTreeSet<FunctionFlag>,
    pub ownership_renounced: bool,
    pub bytecode_size: usize,
    /// Verified source contains `selfdestruct`
    #[serde(default)]
    pub self_destruct: bool,
    /// Extra evidence gathered while scanning
    #[serde(default)]
    pub notes: Vec<String>,
}

impl ContractSignals {
    pub fn has(&self, flag: FunctionFlag) -> bool {
        self.detected_functions.contains(&flag)
    }
}

/// Address activity as reported by a chain data source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressHistory {
    pub tx_count: u64,
    pub first_seen: Option<DateTime<Utc>>,
    pub balance_native: f64,
    /// Contract deployments by this address, oldest first
    pub deployment_timestamps: Vec<DateTime<Utc>>,
}

/// Creator reputation inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorProfile {
    pub address: String,
    pub prior_tx_count: u64,
    /// Deployments inside the serial-deployer window
    pub prior_deployment_count: u64,
    pub native_balance: f64,
    pub is_known_bad_actor: bool,
    pub first_seen: Option<DateTime<Utc>>,
}

impl CreatorProfile {
    /// Build a profile from raw history, counting deployments in the
    /// `window` that ends at `as_of`.
    pub fn from_history(
        address: &str,
        history: &AddressHistory,
        is_known_bad_actor: bool,
        window: Duration,
        as_of: DateTime<Utc>,
    ) -> Self {
        let window_start = as_of - window;
        let prior_deployment_count = history
            .deployment_timestamps
            .iter()
            .filter(|ts| **ts >= window_start && **ts <= as_of)
            .count() as u64;

        Self {
            address: address.to_string(),
            prior_tx_count: history.tx_count,
            prior_deployment_count,
            native_balance: history.balance_native,
            is_known_bad_actor,
            first_seen: history.first_seen,
        }
    }
}

/// Pool state as reported by a chain data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    pub pool_address: Option<String>,
    pub reserve_native: f64,
    /// Reserve at pool creation, when the provider knows it
    pub initial_reserve_native: Option<f64>,
    pub locked: bool,
    pub lock_duration_secs: Option<u64>,
}

/// Liquidity inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityState {
    pub initial_liquidity_native: f64,
    pub current_liquidity_native: f64,
    pub is_locked: bool,
    pub lock_duration_seconds: Option<u64>,
}

impl From<&PoolState> for LiquidityState {
    fn from(pool: &PoolState) -> Self {
        Self {
            initial_liquidity_native: pool.initial_reserve_native.unwrap_or(pool.reserve_native),
            current_liquidity_native: pool.reserve_native,
            is_locked: pool.locked,
            lock_duration_seconds: pool.lock_duration_secs,
        }
    }
}

/// A single token transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub from: String,
    pub to: String,
    /// Raw amount in base units
    pub amount: f64,
    /// Block number (EVM) or slot (Solana)
    pub block: u64,
    pub timestamp: Option<DateTime<Utc>>,
    pub tx_hash: String,
}

/// Summary of the transfer graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferPattern {
    pub total_transfers_sampled: usize,
    pub unique_counterparties: usize,
    pub unique_holders: usize,
    pub max_single_holder_share: f64,
    pub wash_trade_score: f64,
    pub rapid_buy_sell_count: usize,
}

/// Social metadata as reported by a provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialMetadata {
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub followers: Option<u64>,
}

/// Coarse follower count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowerBucket {
    Unknown,
    None,
    Small,
    Medium,
    Large,
}

impl FollowerBucket {
    pub fn from_count(count: Option<u64>) -> Self {
        match count {
            None => FollowerBucket::Unknown,
            Some(0) => FollowerBucket::None,
            Some(n) if n < 1_000 => FollowerBucket::Small,
            Some(n) if n < 50_000 => FollowerBucket::Medium,
            Some(_) => FollowerBucket::Large,
        }
    }
}

/// Social presence inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialSignals {
    pub has_website: bool,
    pub has_twitter: bool,
    pub has_telegram: bool,
    pub follower_count_bucket: FollowerBucket,
}

impl From<&SocialMetadata> for SocialSignals {
    fn from(meta: &SocialMetadata) -> Self {
        let present = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.trim().is_empty());
        Self {
            has_website: present(&meta.website),
            has_twitter: present(&meta.twitter),
            has_telegram: present(&meta.telegram),
            follower_count_bucket: FollowerBucket::from_count(meta.followers),
        }
    }
}
