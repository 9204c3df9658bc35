//! Social metadata lookup
//!
//! Best-effort: absence of data is not a failure.

use async_trait::async_trait;

use super::dexscreener::{DexPair, DexScreenerClient};
use crate::error::FetchError;
use crate::models::{Chain, SocialMetadata};

#[async_trait]
pub trait SocialMetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Social links for a token, looked up by address (or symbol where the
    /// provider supports it). `None` when the provider knows nothing.
    async fn lookup(
        &self,
        chain: Chain,
        token_symbol_or_address: &str,
    ) -> Result<Option<SocialMetadata>, FetchError>;
}

/// Reads website and social links from DexScreener pair info
pub struct DexScreenerSocialProvider {
    client: DexScreenerClient,
}

impl DexScreenerSocialProvider {
    pub fn new(client: DexScreenerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SocialMetadataProvider for DexScreenerSocialProvider {
    fn name(&self) -> &str {
        super::dexscreener::PROVIDER
    }

    async fn lookup(
        &self,
        chain: Chain,
        token_symbol_or_address: &str,
    ) -> Result<Option<SocialMetadata>, FetchError> {
        let pairs = match self.client.token_pairs(chain, token_symbol_or_address).await {
            Ok(pairs) => pairs,
            Err(FetchError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(metadata_from_pairs(&pairs))
    }
}

/// Merge links across all pairs of a token
pub fn metadata_from_pairs(pairs: &[DexPair]) -> Option<SocialMetadata> {
    let mut meta = SocialMetadata::default();
    let mut any_info = false;

    for info in pairs.iter().filter_map(|p| p.info.as_ref()) {
        any_info = true;
        if meta.website.is_none() {
            meta.website = info.websites.first().map(|w| w.url.clone());
        }
        for social in &info.socials {
            match social.kind.to_ascii_lowercase().as_str() {
                "twitter" | "x" if meta.twitter.is_none() => meta.twitter = Some(social.url.clone()),
                "telegram" | "discord" if meta.telegram.is_none() => {
                    meta.telegram = Some(social.url.clone())
                }
                _ => {}
            }
        }
    }

    any_info.then_some(meta)
}
