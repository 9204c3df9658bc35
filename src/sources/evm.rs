//! EVM chain data source
//!
//! Talks to three providers:
//! - the chain's JSON-RPC node (code, calls, logs, blocks, balances)
//! - an Etherscan-compatible explorer (verified source, creator, tx list)
//! - DexScreener (pool reserves)

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

use super::dexscreener::{self, best_native_pair, DexScreenerClient};
use super::{get_json, ChainDataSource, DiscoveryCursor};
use crate::analyzers::contract::{count_erc20_selectors, MIN_ERC20_SELECTORS};
use crate::cache::LookupKind;
use crate::config::ChainConfig;
use crate::error::FetchError;
use crate::models::{
    AddressHistory, Chain, OwnerStatus, PoolState, SourceInfo, TokenLaunch, TransferEvent,
};

pub const RPC_PROVIDER: &str = "rpc";
pub const EXPLORER_PROVIDER: &str = "explorer";

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

const SEL_OWNER: &str = "0x8da5cb5b";
const SEL_GET_OWNER: &str = "0x893d20e8";
const SEL_NAME: &str = "0x06fdde03";
const SEL_SYMBOL: &str = "0x95d89b41";
const SEL_TOTAL_SUPPLY: &str = "0x18160ddd";
const SEL_BALANCE_OF: &str = "70a08231";

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
pub const DEAD_ADDRESS: &str = "0x000000000000000000000000000000000000dead";

/// Blocks searched backwards for transfer logs
const TRANSFER_LOOKBACK_BLOCKS: u64 = 5_000;
const WEI_PER_NATIVE: f64 = 1e18;

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    message: String,
    result: Value,
}

#[derive(Debug, Deserialize)]
struct ExplorerSource {
    #[serde(rename = "SourceCode", default)]
    source_code: String,
    #[serde(rename = "ContractName", default)]
    contract_name: String,
    #[serde(rename = "Proxy", default)]
    proxy: String,
    #[serde(rename = "Implementation", default)]
    implementation: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplorerCreation {
    contract_creator: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplorerTx {
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    contract_address: String,
    time_stamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    topics: Vec<String>,
    data: String,
    block_number: String,
    transaction_hash: String,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    timestamp: String,
    transactions: Vec<RpcTx>,
}

#[derive(Debug, Deserialize)]
struct RpcTx {
    hash: String,
    from: String,
    to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    contract_address: Option<String>,
    status: Option<String>,
}

/// Data source for one EVM chain
pub struct EvmDataSource {
    chain: Chain,
    http: reqwest::Client,
    rpc_url: String,
    explorer_url: Option<String>,
    explorer_api_key: Option<String>,
    dexscreener: DexScreenerClient,
    /// Addresses whose LP holdings count as locked
    lp_lockers: Vec<String>,
    lock_share_threshold: f64,
    max_blocks_per_poll: u64,
    request_id: AtomicU64,
}

impl EvmDataSource {
    pub fn new(
        config: &ChainConfig,
        http: reqwest::Client,
        dexscreener: DexScreenerClient,
        lock_share_threshold: f64,
    ) -> Self {
        let mut lp_lockers = vec![ZERO_ADDRESS.to_string(), DEAD_ADDRESS.to_string()];
        lp_lockers.extend(config.lp_lockers.iter().map(|a| a.to_ascii_lowercase()));

        Self {
            chain: config.chain,
            http,
            rpc_url: config.rpc_url.clone(),
            explorer_url: config.explorer_url.clone(),
            explorer_api_key: config.explorer_api_key.clone(),
            dexscreener,
            lp_lockers,
            lock_share_threshold,
            max_blocks_per_poll: config.max_blocks_per_poll.max(1),
            request_id: AtomicU64::new(1),
        }
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, FetchError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(RPC_PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(RPC_PROVIDER, status, &text));
        }

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(RPC_PROVIDER, e))?;

        if let Some(err) = parsed.error {
            return Err(classify_rpc_error(method, err.code, &err.message));
        }
        parsed
            .result
            .ok_or_else(|| FetchError::NotFound(format!("{} returned null", method)))
    }

    async fn eth_call(&self, to: &str, data: &str) -> Result<Vec<u8>, FetchError> {
        let hex_result: String = self
            .rpc("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await?;
        decode_hex(&hex_result)
    }

    async fn explorer(&self, query: &str) -> Result<Option<Value>, FetchError> {
        let Some(base) = &self.explorer_url else {
            return Ok(None);
        };
        let mut url = format!("{}?{}", base, query);
        if let Some(key) = &self.explorer_api_key {
            url.push_str("&apikey=");
            url.push_str(key);
        }

        let response: ExplorerResponse = get_json(&self.http, EXPLORER_PROVIDER, &url).await?;
        if response.status == "1" {
            return Ok(Some(response.result));
        }

        let detail = response.result.as_str().unwrap_or_default().to_ascii_lowercase();
        let message = response.message.to_ascii_lowercase();
        if detail.contains("rate limit") || message.contains("rate limit") {
            Err(FetchError::rate_limited(EXPLORER_PROVIDER, None))
        } else if message.contains("no transactions found") || message.contains("no records found") {
            Ok(Some(Value::Array(Vec::new())))
        } else if detail.contains("invalid api key") || detail.contains("invalid address") {
            Err(FetchError::Permanent(format!("explorer rejected request: {}", detail)))
        } else {
            Err(FetchError::transient(
                EXPLORER_PROVIDER,
                format!("{}: {}", response.message, detail),
            ))
        }
    }

    async fn latest_block(&self) -> Result<u64, FetchError> {
        let hex_block: String = self.rpc("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&hex_block)
    }

    /// Share of LP supply held by burn addresses and lockers
    async fn locked_lp_share(&self, pair: &str) -> Result<f64, FetchError> {
        let supply = parse_u256_f64(&self.eth_call(pair, SEL_TOTAL_SUPPLY).await?);
        if supply <= 0.0 {
            return Ok(0.0);
        }

        let mut locked = 0.0;
        for holder in &self.lp_lockers {
            let data = format!("0x{}{:0>64}", SEL_BALANCE_OF, holder.trim_start_matches("0x"));
            locked += parse_u256_f64(&self.eth_call(pair, &data).await?);
        }
        Ok((locked / supply).min(1.0))
    }

    async fn read_string(&self, token: &str, selector: &str) -> Option<String> {
        match self.eth_call(token, selector).await {
            Ok(bytes) => decode_abi_string(&bytes),
            Err(e) => {
                tracing::trace!(token = token, selector = selector, error = %e, "String call failed");
                None
            }
        }
    }

    /// Contract creations in one block that look like ERC-20 tokens
    async fn scan_block(&self, number: u64) -> Result<Vec<TokenLaunch>, FetchError> {
        let block: RpcBlock = self
            .rpc("eth_getBlockByNumber", json!([format!("0x{:x}", number), true]))
            .await?;
        let block_time = parse_hex_u64(&block.timestamp)
            .ok()
            .and_then(|ts| Utc.timestamp_opt(ts as i64, 0).single())
            .unwrap_or_else(Utc::now);

        let mut launches = Vec::new();
        for tx in block.transactions.iter().filter(|tx| tx.to.is_none()) {
            let receipt: RpcReceipt = match self
                .rpc("eth_getTransactionReceipt", json!([tx.hash]))
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(chain = %self.chain, tx = %tx.hash, error = %e, "Receipt unavailable");
                    continue;
                }
            };
            if receipt.status.as_deref() == Some("0x0") {
                continue;
            }
            let Some(contract) = receipt.contract_address else {
                continue;
            };

            let code = match self.get_bytecode(&contract).await {
                Ok(code) => code,
                Err(_) => continue,
            };
            if count_erc20_selectors(&code) < MIN_ERC20_SELECTORS {
                tracing::trace!(chain = %self.chain, contract = %contract, "Contract creation is not a token");
                continue;
            }

            let name = self.read_string(&contract, SEL_NAME).await;
            let symbol = self.read_string(&contract, SEL_SYMBOL).await;
            let total_supply = self
                .eth_call(&contract, SEL_TOTAL_SUPPLY)
                .await
                .ok()
                .and_then(|b| parse_u256_u128(&b));

            launches.push(TokenLaunch {
                chain: self.chain,
                address: contract.to_ascii_lowercase(),
                creator: Some(tx.from.to_ascii_lowercase()),
                discovered_at: block_time,
                name,
                symbol,
                total_supply,
                pool_address: None,
            });
        }
        Ok(launches)
    }
}

#[async_trait]
impl ChainDataSource for EvmDataSource {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn provider(&self, kind: LookupKind) -> &str {
        match kind {
            LookupKind::Source | LookupKind::Creator | LookupKind::CreatorHistory => {
                if self.explorer_url.is_some() {
                    EXPLORER_PROVIDER
                } else {
                    RPC_PROVIDER
                }
            }
            LookupKind::LiquidityPool | LookupKind::SocialMetadata => dexscreener::PROVIDER,
            _ => RPC_PROVIDER,
        }
    }

    async fn get_bytecode(&self, address: &str) -> Result<Vec<u8>, FetchError> {
        let hex_code: String = self.rpc("eth_getCode", json!([address, "latest"])).await?;
        let code = decode_hex(&hex_code)?;
        if code.is_empty() {
            return Err(FetchError::NotFound(format!("no contract code at {}", address)));
        }
        Ok(code)
    }

    async fn get_source(&self, address: &str) -> Result<Option<SourceInfo>, FetchError> {
        let query = format!("module=contract&action=getsourcecode&address={}", address);
        let Some(result) = self.explorer(&query).await? else {
            return Ok(None);
        };

        let entries: Vec<ExplorerSource> = serde_json::from_value(result)
            .map_err(|e| FetchError::Permanent(format!("unexpected explorer payload: {}", e)))?;
        let Some(entry) = entries.into_iter().next() else {
            return Ok(None);
        };

        let verified = !entry.source_code.trim().is_empty();
        Ok(Some(SourceInfo {
            verified,
            source_code: verified.then_some(entry.source_code),
            contract_name: (!entry.contract_name.is_empty()).then_some(entry.contract_name),
            proxy: entry.proxy == "1",
            implementation: (!entry.implementation.is_empty()).then_some(entry.implementation),
        }))
    }

    async fn get_owner(&self, address: &str) -> Result<OwnerStatus, FetchError> {
        for selector in [SEL_OWNER, SEL_GET_OWNER] {
            match self.eth_call(address, selector).await {
                Ok(bytes) if bytes.len() >= 32 => {
                    let owner = format!("0x{}", hex::encode(&bytes[12..32]));
                    if owner == ZERO_ADDRESS || owner == DEAD_ADDRESS {
                        return Ok(OwnerStatus::Renounced);
                    }
                    return Ok(OwnerStatus::Owned(owner));
                }
                Ok(_) => continue,
                // Reverted: the contract has no such getter
                Err(FetchError::Permanent(_)) | Err(FetchError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(OwnerStatus::Unknown)
    }

    async fn get_creator(&self, address: &str) -> Result<Option<String>, FetchError> {
        let query = format!(
            "module=contract&action=getcontractcreation&contractaddresses={}",
            address
        );
        let Some(result) = self.explorer(&query).await? else {
            return Ok(None);
        };
        let entries: Vec<ExplorerCreation> = serde_json::from_value(result).unwrap_or_default();
        Ok(entries
            .into_iter()
            .next()
            .map(|c| c.contract_creator.to_ascii_lowercase()))
    }

    async fn get_address_history(&self, address: &str) -> Result<AddressHistory, FetchError> {
        let nonce_hex: String = self
            .rpc("eth_getTransactionCount", json!([address, "latest"]))
            .await?;
        let balance_hex: String = self.rpc("eth_getBalance", json!([address, "latest"])).await?;

        let mut history = AddressHistory {
            tx_count: parse_hex_u64(&nonce_hex)?,
            first_seen: None,
            balance_native: parse_u256_f64(&decode_hex(&balance_hex)?) / WEI_PER_NATIVE,
            deployment_timestamps: Vec::new(),
        };

        let query = format!(
            "module=account&action=txlist&address={}&startblock=0&endblock=99999999&page=1&offset=1000&sort=asc",
            address
        );
        if let Some(result) = self.explorer(&query).await? {
            let txs: Vec<ExplorerTx> = serde_json::from_value(result).unwrap_or_default();
            history.first_seen = txs.first().and_then(|tx| parse_unix(&tx.time_stamp));
            history.deployment_timestamps = txs
                .iter()
                .filter(|tx| {
                    tx.to.is_empty()
                        && !tx.contract_address.is_empty()
                        && tx.from.eq_ignore_ascii_case(address)
                })
                .filter_map(|tx| parse_unix(&tx.time_stamp))
                .collect();
            history.tx_count = history.tx_count.max(txs.len() as u64);
        }

        Ok(history)
    }

    async fn get_transfer_events(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TransferEvent>, FetchError> {
        let latest = self.latest_block().await?;
        let from = latest.saturating_sub(TRANSFER_LOOKBACK_BLOCKS);
        let logs: Vec<RpcLog> = self
            .rpc(
                "eth_getLogs",
                json!([{
                    "address": address,
                    "fromBlock": format!("0x{:x}", from),
                    "toBlock": format!("0x{:x}", latest),
                    "topics": [TRANSFER_TOPIC],
                }]),
            )
            .await?;

        let mut events: Vec<TransferEvent> = logs
            .iter()
            .filter(|log| log.topics.len() >= 3)
            .filter_map(|log| {
                Some(TransferEvent {
                    from: topic_address(&log.topics[1])?,
                    to: topic_address(&log.topics[2])?,
                    amount: parse_u256_f64(&decode_hex(&log.data).ok()?),
                    block: parse_hex_u64(&log.block_number).ok()?,
                    timestamp: None,
                    tx_hash: log.transaction_hash.clone(),
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
        let pairs = match self.dexscreener.token_pairs(self.chain, token_address).await {
            Ok(pairs) => pairs,
            Err(FetchError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let Some(pair) = best_native_pair(self.chain, token_address, &pairs, pool_hint) else {
            return Ok(None);
        };
        let reserve_native = pair.native_reserve(self.chain).unwrap_or(0.0);

        let locked = match self.locked_lp_share(&pair.pair_address).await {
            Ok(share) => share >= self.lock_share_threshold,
            Err(e) => {
                // Concentrated-liquidity pools have no fungible LP token
                tracing::debug!(chain = %self.chain, pair = %pair.pair_address, error = %e, "LP lock check failed");
                false
            }
        };

        Ok(Some(PoolState {
            pool_address: Some(pair.pair_address.clone()),
            reserve_native,
            initial_reserve_native: None,
            locked,
            lock_duration_secs: None,
        }))
    }

    async fn discover_new_tokens(
        &self,
        cursor: &mut DiscoveryCursor,
    ) -> Result<Vec<TokenLaunch>, FetchError> {
        let latest = self.latest_block().await?;
        let start = match cursor.last_block {
            Some(last) if last >= latest => return Ok(Vec::new()),
            Some(last) => last + 1,
            // First tick: start at the head rather than backfilling history
            None => latest,
        };
        let end = latest.min(start + self.max_blocks_per_poll - 1);

        let mut launches = Vec::new();
        for number in start..=end {
            for launch in self.scan_block(number).await? {
                if cursor.mark_seen(&launch.address) {
                    launches.push(launch);
                }
            }
            cursor.last_block = Some(number);
        }
        Ok(launches)
    }
}

fn classify_rpc_error(method: &str, code: i64, message: &str) -> FetchError {
    let lower = message.to_ascii_lowercase();
    if code == -32005 || code == 429 || lower.contains("rate limit") || lower.contains("too many requests") {
        FetchError::rate_limited(RPC_PROVIDER, None)
    } else if code == 3 || lower.contains("execution reverted") {
        FetchError::Permanent(format!("{} reverted: {}", method, message))
    } else if code == -32602 || code == -32601 || code == -32600 {
        FetchError::Permanent(format!("{} rejected ({}): {}", method, code, message))
    } else {
        FetchError::transient(RPC_PROVIDER, format!("{} failed ({}): {}", method, code, message))
    }
}

fn decode_hex(value: &str) -> Result<Vec<u8>, FetchError> {
    let digits = value.trim_start_matches("0x");
    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{}", digits);
        padded.as_str()
    } else {
        digits
    };
    hex::decode(digits).map_err(|e| FetchError::Permanent(format!("invalid hex from node: {}", e)))
}

fn parse_hex_u64(value: &str) -> Result<u64, FetchError> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| FetchError::Permanent(format!("invalid hex quantity {}: {}", value, e)))
}

fn parse_unix(value: &str) -> Option<DateTime<Utc>> {
    value
        .parse::<i64>()
        .ok()
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
}

/// Big-endian unsigned integer as f64 (lossy above 2^53)
pub fn parse_u256_f64(bytes: &[u8]) -> f64 {
    bytes
        .iter()
        .take(32)
        .fold(0.0, |acc, b| acc * 256.0 + f64::from(*b))
}

/// Big-endian uint256 as u128, `None` on overflow or empty input
pub fn parse_u256_u128(bytes: &[u8]) -> Option<u128> {
    if bytes.is_empty() {
        return None;
    }
    let word = &bytes[..bytes.len().min(32)];
    let split = word.len().saturating_sub(16);
    if word[..split].iter().any(|b| *b != 0) {
        return None;
    }
    Some(word[split..].iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b)))
}

/// Decode an ABI `string` return value, or a `bytes32` fallback
pub fn decode_abi_string(bytes: &[u8]) -> Option<String> {
    let raw = if bytes.len() >= 64 {
        let offset = parse_u256_u128(&bytes[..32])? as usize;
        let len_end = offset.checked_add(32)?;
        let len = parse_u256_u128(bytes.get(offset..len_end)?)? as usize;
        bytes.get(len_end..len_end.checked_add(len)?)?.to_vec()
    } else if bytes.len() == 32 {
        bytes.iter().copied().take_while(|b| *b != 0).collect()
    } else {
        return None;
    };

    let text = String::from_utf8_lossy(&raw).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn topic_address(topic: &str) -> Option<String> {
    let digits = topic.trim_start_matches("0x");
    if digits.len() != 64 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", digits.get(24..)?.to_ascii_lowercase()))
}
