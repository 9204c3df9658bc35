//! Solana chain data source
//!
//! Provides:
//! - Mint account data and authorities via Solana RPC
//! - Creator activity (balance, signatures) via Solana RPC
//! - Token transfers via Helius enhanced transactions
//! - Pool reserves via DexScreener, LP lock share via RugCheck
//! - Discovery from DexScreener's latest token profiles

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use solana_client::client_error::ClientError;
use solana_client::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::dexscreener::{self, best_native_pair, DexScreenerClient};
use super::{get_json, ChainDataSource, DiscoveryCursor};
use crate::analyzers::contract::{parse_spl_mint, SPL_TOKEN_2022_PROGRAM, SPL_TOKEN_PROGRAM};
use crate::cache::LookupKind;
use crate::error::FetchError;
use crate::models::{
    AddressHistory, Chain, OwnerStatus, PoolState, SourceInfo, TokenLaunch, TransferEvent,
};

pub const RPC_PROVIDER: &str = "rpc";
pub const HELIUS_PROVIDER: &str = "helius";
pub const RUGCHECK_PROVIDER: &str = "rugcheck";

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeliusTokenTransfer {
    #[serde(default)]
    from_user_account: Option<String>,
    #[serde(default)]
    to_user_account: Option<String>,
    #[serde(default)]
    token_amount: f64,
    mint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeliusTransaction {
    signature: String,
    slot: u64,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    fee_payer: Option<String>,
    #[serde(default)]
    token_transfers: Vec<HeliusTokenTransfer>,
}

#[derive(Debug, Deserialize)]
struct RugcheckLp {
    #[serde(rename = "lpLockedPct", default)]
    lp_locked_pct: f64,
}

#[derive(Debug, Deserialize)]
struct RugcheckMarket {
    #[serde(default)]
    pubkey: Option<String>,
    lp: Option<RugcheckLp>,
}

#[derive(Debug, Deserialize)]
struct RugcheckReport {
    #[serde(default)]
    markets: Vec<RugcheckMarket>,
}

/// Data source for Solana
pub struct SolanaDataSource {
    rpc_client: Arc<RpcClient>,
    http: reqwest::Client,
    helius_url: String,
    helius_api_key: Option<String>,
    rugcheck_url: String,
    dexscreener: DexScreenerClient,
    lock_share_threshold: f64,
}

impl SolanaDataSource {
    pub fn new(
        rpc_url: &str,
        http: reqwest::Client,
        dexscreener: DexScreenerClient,
        helius_url: &str,
        helius_api_key: Option<String>,
        rugcheck_url: &str,
        lock_share_threshold: f64,
    ) -> Self {
        let rpc_client = RpcClient::new_with_timeout(rpc_url.to_string(), Duration::from_secs(10));
        Self::with_client(
            Arc::new(rpc_client),
            http,
            dexscreener,
            helius_url,
            helius_api_key,
            rugcheck_url,
            lock_share_threshold,
        )
    }

    /// Create from an existing RPC client
    pub fn with_client(
        rpc_client: Arc<RpcClient>,
        http: reqwest::Client,
        dexscreener: DexScreenerClient,
        helius_url: &str,
        helius_api_key: Option<String>,
        rugcheck_url: &str,
        lock_share_threshold: f64,
    ) -> Self {
        Self {
            rpc_client,
            http,
            helius_url: helius_url.trim_end_matches('/').to_string(),
            helius_api_key,
            rugcheck_url: rugcheck_url.trim_end_matches('/').to_string(),
            dexscreener,
            lock_share_threshold,
        }
    }

    /// Run a blocking RPC call on the blocking pool
    async fn blocking<T, F>(&self, call: F) -> Result<T, FetchError>
    where
        T: Send + 'static,
        F: FnOnce(&RpcClient) -> Result<T, ClientError> + Send + 'static,
    {
        let rpc_client = self.rpc_client.clone();
        tokio::task::spawn_blocking(move || call(&rpc_client))
            .await
            .map_err(|e| FetchError::transient(RPC_PROVIDER, format!("task join error: {}", e)))?
            .map_err(classify_client_error)
    }

    async fn mint_account(&self, address: &str) -> Result<(Vec<u8>, Pubkey), FetchError> {
        let mint = parse_pubkey(address)?;
        let account = self.blocking(move |rpc| rpc.get_account(&mint)).await?;
        Ok((account.data, account.owner))
    }

    async fn helius_transactions(&self, address: &str) -> Result<Vec<HeliusTransaction>, FetchError> {
        let Some(key) = &self.helius_api_key else {
            return Err(FetchError::NotFound("helius api key not configured".to_string()));
        };
        let url = format!(
            "{}/v0/addresses/{}/transactions?api-key={}&limit=100",
            self.helius_url, address, key
        );
        get_json(&self.http, HELIUS_PROVIDER, &url).await
    }

    /// Highest LP locked share reported by RugCheck, as a fraction
    async fn locked_lp_share(&self, mint: &str, pool: &str) -> Result<f64, FetchError> {
        let url = format!("{}/v1/tokens/{}/report", self.rugcheck_url, mint);
        let report: RugcheckReport = get_json(&self.http, RUGCHECK_PROVIDER, &url).await?;

        let matching = report
            .markets
            .iter()
            .find(|m| m.pubkey.as_deref() == Some(pool))
            .and_then(|m| m.lp.as_ref())
            .map(|lp| lp.lp_locked_pct);
        let best = report
            .markets
            .iter()
            .filter_map(|m| m.lp.as_ref().map(|lp| lp.lp_locked_pct))
            .fold(0.0_f64, f64::max);

        Ok(matching.unwrap_or(best).clamp(0.0, 100.0) / 100.0)
    }
}

#[async_trait]
impl ChainDataSource for SolanaDataSource {
    fn chain(&self) -> Chain {
        Chain::Solana
    }

    fn provider(&self, kind: LookupKind) -> &str {
        match kind {
            LookupKind::LiquidityPool | LookupKind::Discovery | LookupKind::SocialMetadata => {
                dexscreener::PROVIDER
            }
            LookupKind::TransferEvents | LookupKind::Creator if self.helius_api_key.is_some() => {
                HELIUS_PROVIDER
            }
            _ => RPC_PROVIDER,
        }
    }

    async fn get_bytecode(&self, address: &str) -> Result<Vec<u8>, FetchError> {
        let (data, owner) = self.mint_account(address).await?;
        let owner = owner.to_string();
        if owner != SPL_TOKEN_PROGRAM && owner != SPL_TOKEN_2022_PROGRAM {
            return Err(FetchError::Permanent(format!(
                "{} is not a token mint (owner {})",
                address, owner
            )));
        }
        Ok(data)
    }

    async fn get_source(&self, address: &str) -> Result<Option<SourceInfo>, FetchError> {
        let (_, owner) = self.mint_account(address).await?;
        let owner = owner.to_string();
        let contract_name = if owner == SPL_TOKEN_PROGRAM {
            "spl-token"
        } else if owner == SPL_TOKEN_2022_PROGRAM {
            "spl-token-2022"
        } else {
            return Ok(None);
        };

        // Mints are data accounts of the audited token programs, not custom code
        Ok(Some(SourceInfo {
            verified: true,
            source_code: None,
            contract_name: Some(contract_name.to_string()),
            proxy: false,
            implementation: None,
        }))
    }

    async fn get_owner(&self, address: &str) -> Result<OwnerStatus, FetchError> {
        let (data, _) = self.mint_account(address).await?;
        let mint = parse_spl_mint(&data)
            .ok_or_else(|| FetchError::Permanent(format!("{} has an invalid mint layout", address)))?;

        Ok(match (mint.mint_authority, mint.freeze_authority) {
            (None, None) => OwnerStatus::Renounced,
            (Some(authority), _) | (None, Some(authority)) => OwnerStatus::Owned(authority),
        })
    }

    async fn get_creator(&self, address: &str) -> Result<Option<String>, FetchError> {
        if self.helius_api_key.is_some() {
            match self.helius_transactions(address).await {
                // Newest first; the last one on the page is the closest to creation
                Ok(txs) => {
                    if let Some(payer) = txs.iter().rev().find_map(|tx| tx.fee_payer.clone()) {
                        return Ok(Some(payer));
                    }
                }
                Err(e) if e.is_retryable() => return Err(e),
                Err(e) => tracing::debug!(mint = address, error = %e, "Helius creator lookup failed"),
            }
        }

        match self.get_owner(address).await? {
            OwnerStatus::Owned(authority) => Ok(Some(authority)),
            _ => Ok(None),
        }
    }

    async fn get_address_history(&self, address: &str) -> Result<AddressHistory, FetchError> {
        let key = parse_pubkey(address)?;
        let lamports = self.blocking(move |rpc| rpc.get_balance(&key)).await?;
        let signatures = self
            .blocking(move |rpc| rpc.get_signatures_for_address(&key))
            .await?;

        Ok(AddressHistory {
            tx_count: signatures.len() as u64,
            first_seen: signatures
                .last()
                .and_then(|s| s.block_time)
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
            balance_native: lamports as f64 / LAMPORTS_PER_SOL,
            // Deployment history needs an indexer; RPC alone cannot list mints created by an address
            deployment_timestamps: Vec::new(),
        })
    }

    async fn get_transfer_events(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TransferEvent>, FetchError> {
        let txs = self.helius_transactions(address).await?;

        let mut events: Vec<TransferEvent> = txs
            .iter()
            .rev()
            .flat_map(|tx| {
                tx.token_transfers
                    .iter()
                    .filter(|t| t.mint == address)
                    .filter_map(move |t| {
                        Some(TransferEvent {
                            from: t.from_user_account.clone().filter(|s| !s.is_empty())?,
                            to: t.to_user_account.clone().filter(|s| !s.is_empty())?,
                            amount: t.token_amount,
                            block: tx.slot,
                            timestamp: tx.timestamp.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
                            tx_hash: tx.signature.clone(),
                        })
                    })
            })
            .collect();

        if events.len() > limit {
            events.drain(..events.len() - limit);
        }
        Ok(events)
    }

    async fn get_liquidity_pool(
        &self,
        token_address: &str,
        pool_hint: Option<&str>,
    ) -> Result<Option<PoolState>, FetchError> {
        let pairs = match self.dexscreener.token_pairs(Chain::Solana, token_address).await {
            Ok(pairs) => pairs,
            Err(FetchError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let Some(pair) = best_native_pair(Chain::Solana, token_address, &pairs, pool_hint) else {
            return Ok(None);
        };

        let locked = match self.locked_lp_share(token_address, &pair.pair_address).await {
            Ok(share) => share >= self.lock_share_threshold,
            Err(e) => {
                tracing::debug!(mint = token_address, error = %e, "RugCheck LP lookup failed");
                false
            }
        };

        Ok(Some(PoolState {
            pool_address: Some(pair.pair_address.clone()),
            reserve_native: pair.native_reserve(Chain::Solana).unwrap_or(0.0),
            initial_reserve_native: None,
            locked,
            lock_duration_secs: None,
        }))
    }

    async fn discover_new_tokens(
        &self,
        cursor: &mut DiscoveryCursor,
    ) -> Result<Vec<TokenLaunch>, FetchError> {
        let profiles = self.dexscreener.latest_profiles().await?;

        let mut launches = Vec::new();
        for profile in profiles
            .into_iter()
            .filter(|p| p.chain_id.eq_ignore_ascii_case("solana"))
        {
            if !cursor.mark_seen(&profile.token_address) {
                continue;
            }
            let mut launch = TokenLaunch::new(Chain::Solana, profile.token_address.clone());
            if let Ok((data, _)) = self.mint_account(&profile.token_address).await {
                launch.total_supply = parse_spl_mint(&data).map(|m| u128::from(m.supply));
            }
            launches.push(launch);
        }
        Ok(launches)
    }
}

fn parse_pubkey(address: &str) -> Result<Pubkey, FetchError> {
    Pubkey::from_str(address)
        .map_err(|e| FetchError::Permanent(format!("invalid solana address {}: {}", address, e)))
}

fn classify_client_error(err: ClientError) -> FetchError {
    let message = err.to_string();
    let lower = message.to_ascii_lowercase();
    if lower.contains("429") || lower.contains("too many requests") {
        FetchError::rate_limited(RPC_PROVIDER, None)
    } else if lower.contains("accountnotfound") || lower.contains("could not find account") {
        FetchError::NotFound(message)
    } else if lower.contains("invalid param") {
        FetchError::Permanent(message)
    } else {
        FetchError::transient(RPC_PROVIDER, message)
    }
}
