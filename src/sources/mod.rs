//! External data sources
//!
//! One `ChainDataSource` per monitored chain; the engine is written once
//! against the trait. Providers that are not chain-specific (bad-actor
//! registry, social metadata) have their own traits.

pub mod dexscreener;
pub mod evm;
pub mod registry;
pub mod social;
pub mod solana;

pub use dexscreener::DexScreenerClient;
pub use evm::EvmDataSource;
pub use registry::{KnownBadActorRegistry, StaticBadActorRegistry};
pub use social::{DexScreenerSocialProvider, SocialMetadataProvider};
pub use solana::SolanaDataSource;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::{HashSet, VecDeque};

use crate::cache::LookupKind;
use crate::error::FetchError;
use crate::models::{
    AddressHistory, Chain, OwnerStatus, PoolState, SourceInfo, TokenLaunch, TransferEvent,
};

/// Per-chain capability interface.
///
/// The chain is fixed per instance. Every call may fail with
/// `Transient`, `RateLimited`, `NotFound` or `Permanent`.
#[async_trait]
pub trait ChainDataSource: Send + Sync {
    fn chain(&self) -> Chain;

    /// Provider name used for throttling a given lookup
    fn provider(&self, kind: LookupKind) -> &str;

    /// Deployed code (EVM) or raw mint account data (Solana)
    async fn get_bytecode(&self, address: &str) -> Result<Vec<u8>, FetchError>;

    /// Verification data; `None` when the explorer has nothing
    async fn get_source(&self, address: &str) -> Result<Option<SourceInfo>, FetchError>;

    async fn get_owner(&self, address: &str) -> Result<OwnerStatus, FetchError>;

    /// Deployer of a token, when it can be determined
    async fn get_creator(&self, address: &str) -> Result<Option<String>, FetchError>;

    async fn get_address_history(&self, address: &str) -> Result<AddressHistory, FetchError>;

    /// Most recent transfers of a token, oldest first, at most `limit`
    async fn get_transfer_events(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TransferEvent>, FetchError>;

    /// Deepest native-quoted pool for a token; `None` if no pool exists yet
    async fn get_liquidity_pool(
        &self,
        token_address: &str,
        pool_hint: Option<&str>,
    ) -> Result<Option<PoolState>, FetchError>;

    /// Tokens deployed since `cursor`, advancing it
    async fn discover_new_tokens(
        &self,
        cursor: &mut DiscoveryCursor,
    ) -> Result<Vec<TokenLaunch>, FetchError>;
}

/// Discovery progress for one chain
#[derive(Debug, Default)]
pub struct DiscoveryCursor {
    /// Last block fully scanned (EVM)
    pub last_block: Option<u64>,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl DiscoveryCursor {
    const MAX_SEEN: usize = 10_000;

    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `address`; false if it was already seen
    pub fn mark_seen(&mut self, address: &str) -> bool {
        if !self.seen.insert(address.to_string()) {
            return false;
        }
        self.order.push_back(address.to_string());
        if self.order.len() > Self::MAX_SEEN {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

/// Shared HTTP client for all providers
pub fn http_client(timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("launchguard/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// GET a JSON document, classifying failures
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
) -> Result<T, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(std::time::Duration::from_secs);
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::rate_limited(provider, retry_after));
        }
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::from_status(provider, status, &body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| FetchError::from_reqwest(provider, e))
}
