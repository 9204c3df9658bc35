//! Chains and token launches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;

use crate::error::FetchError;

/// Supported chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Base,
    Bsc,
    Polygon,
    Arbitrum,
    Solana,
}

/// Chain family, one data-source implementation per family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    Evm,
    Solana,
}

impl Chain {
    pub const ALL: [Chain; 6] = [
        Chain::Ethereum,
        Chain::Base,
        Chain::Bsc,
        Chain::Polygon,
        Chain::Arbitrum,
        Chain::Solana,
    ];

    pub fn family(&self) -> ChainFamily {
        match self {
            Chain::Solana => ChainFamily::Solana,
            _ => ChainFamily::Evm,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Base => "base",
            Chain::Bsc => "bsc",
            Chain::Polygon => "polygon",
            Chain::Arbitrum => "arbitrum",
            Chain::Solana => "solana",
        }
    }

    /// Symbol of the native unit liquidity is measured in
    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Ethereum | Chain::Base | Chain::Arbitrum => "ETH",
            Chain::Bsc => "BNB",
            Chain::Polygon => "POL",
            Chain::Solana => "SOL",
        }
    }

    /// Wrapped native token symbols as quoted by DEX aggregators
    pub fn wrapped_native_symbols(&self) -> &'static [&'static str] {
        match self {
            Chain::Ethereum | Chain::Base | Chain::Arbitrum => &["WETH", "ETH"],
            Chain::Bsc => &["WBNB", "BNB"],
            Chain::Polygon => &["WPOL", "WMATIC", "POL", "MATIC"],
            Chain::Solana => &["SOL", "WSOL"],
        }
    }

    /// Validate and normalize an address for this chain.
    ///
    /// EVM addresses are lowercased. A malformed address is a permanent
    /// failure: nothing downstream can recover from it.
    pub fn normalize_address(&self, address: &str) -> Result<String, FetchError> {
        let address = address.trim();
        match self.family() {
            ChainFamily::Evm => {
                let hex_part = address
                    .strip_prefix("0x")
                    .or_else(|| address.strip_prefix("0X"))
                    .ok_or_else(|| {
                        FetchError::Permanent(format!("{} address missing 0x prefix: {}", self, address))
                    })?;
                if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(FetchError::Permanent(format!(
                        "malformed {} address: {}",
                        self, address
                    )));
                }
                Ok(format!("0x{}", hex_part.to_ascii_lowercase()))
            }
            ChainFamily::Solana => Pubkey::from_str(address)
                .map(|key| key.to_string())
                .map_err(|e| FetchError::Permanent(format!("malformed solana address {}: {}", address, e))),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ethereum" | "eth" => Ok(Chain::Ethereum),
            "base" => Ok(Chain::Base),
            "bsc" | "binance" => Ok(Chain::Bsc),
            "polygon" | "matic" => Ok(Chain::Polygon),
            "arbitrum" | "arb" => Ok(Chain::Arbitrum),
            "solana" | "sol" => Ok(Chain::Solana),
            other => Err(FetchError::Permanent(format!("unsupported chain: {}", other))),
        }
    }
}

/// A newly deployed token.
///
/// Created once at discovery and never mutated afterwards; assessments are
/// attached by the result store, not stored on the launch itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenLaunch {
    pub chain: Chain,
    /// Token contract (EVM) or mint (Solana) address
    pub address: String,
    /// Deployer, if known at discovery time
    pub creator: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    /// Raw total supply in base units
    pub total_supply: Option<u128>,
    /// Liquidity pool, if the discoverer already knows it
    #[serde(default)]
    pub pool_address: Option<String>,
}

impl TokenLaunch {
    pub fn new(chain: Chain, address: impl Into<String>) -> Self {
        Self {
            chain,
            address: address.into(),
            creator: None,
            discovered_at: Utc::now(),
            name: None,
            symbol: None,
            total_supply: None,
            pool_address: None,
        }
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>, symbol: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.symbol = Some(symbol.into());
        self
    }

    pub fn discovered_at(mut self, at: DateTime<Utc>) -> Self {
        self.discovered_at = at;
        self
    }

    /// Identity of the launch across epochs
    pub fn key(&self) -> String {
        format!("{}:{}", self.chain, self.address)
    }

    /// Short label for logs and reports
    pub fn label(&self) -> String {
        match (&self.symbol, &self.name) {
            (Some(symbol), _) => format!("{} ({})", symbol, self.address),
            (None, Some(name)) => format!("{} ({})", name, self.address),
            (None, None) => self.address.clone(),
        }
    }
}
