//! DexScreener API client
//!
//! Used for pool reserves, social links and Solana token discovery.
//! Endpoints:
//! - `GET /tokens/v1/{chainId}/{tokenAddress}` - pairs for a token
//! - `GET /token-profiles/latest/v1` - newest token profiles

use serde::Deserialize;

use super::get_json;
use crate::error::FetchError;
use crate::models::Chain;

pub const PROVIDER: &str = "dexscreener";

#[derive(Debug, Clone, Deserialize)]
pub struct DexToken {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexLiquidity {
    #[serde(default)]
    pub usd: Option<f64>,
    #[serde(default)]
    pub base: Option<f64>,
    #[serde(default)]
    pub quote: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexWebsite {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexSocial {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexPairInfo {
    #[serde(default)]
    pub websites: Vec<DexWebsite>,
    #[serde(default)]
    pub socials: Vec<DexSocial>,
}

/// One trading pair
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    pub chain_id: String,
    pub pair_address: String,
    pub base_token: DexToken,
    pub quote_token: DexToken,
    #[serde(default)]
    pub liquidity: Option<DexLiquidity>,
    /// Milliseconds since epoch
    #[serde(default)]
    pub pair_created_at: Option<i64>,
    #[serde(default)]
    pub info: Option<DexPairInfo>,
}

impl DexPair {
    /// Native-unit reserve when the pair is quoted in the chain's native token
    pub fn native_reserve(&self, chain: Chain) -> Option<f64> {
        let quote_symbol = self.quote_token.symbol.as_deref()?.to_ascii_uppercase();
        if !chain
            .wrapped_native_symbols()
            .iter()
            .any(|s| *s == quote_symbol)
        {
            return None;
        }
        self.liquidity.as_ref()?.quote
    }
}

/// Token profile from the latest-profiles feed
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexTokenProfile {
    pub chain_id: String,
    pub token_address: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Thin DexScreener client
#[derive(Clone)]
pub struct DexScreenerClient {
    http: reqwest::Client,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// All pairs where `token` is traded
    pub async fn token_pairs(&self, chain: Chain, token: &str) -> Result<Vec<DexPair>, FetchError> {
        let url = format!("{}/tokens/v1/{}/{}", self.base_url, chain.as_str(), token);
        get_json(&self.http, PROVIDER, &url).await
    }

    /// Newest token profiles across all chains
    pub async fn latest_profiles(&self) -> Result<Vec<DexTokenProfile>, FetchError> {
        let url = format!("{}/token-profiles/latest/v1", self.base_url);
        get_json(&self.http, PROVIDER, &url).await
    }
}

/// Deepest native-quoted pair where `token` is the base token.
/// A `pool_hint` wins when it matches one of the pairs.
pub fn best_native_pair<'a>(
    chain: Chain,
    token: &str,
    pairs: &'a [DexPair],
    pool_hint: Option<&str>,
) -> Option<&'a DexPair> {
    let candidates = pairs.iter().filter(|p| {
        p.chain_id.eq_ignore_ascii_case(chain.as_str())
            && p.base_token.address.eq_ignore_ascii_case(token)
            && p.native_reserve(chain).is_some()
    });

    if let Some(hint) = pool_hint {
        if let Some(hinted) = candidates
            .clone()
            .find(|p| p.pair_address.eq_ignore_ascii_case(hint))
        {
            return Some(hinted);
        }
    }

    candidates.max_by(|a, b| {
        let ra = a.native_reserve(chain).unwrap_or(0.0);
        let rb = b.native_reserve(chain).unwrap_or(0.0);
        ra.total_cmp(&rb)
    })
}
