//! Risk assessment engine
//!
//! Gathers raw signals through the fetcher and caches, runs the five factor
//! analyzers concurrently and hands their results to the aggregator.
//! A failed lookup degrades only its own factor; only input errors
//! (malformed address, unsupported chain) abort an assessment.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::aggregator::RiskAggregator;
use crate::analyzers;
use crate::cache::{CacheKey, CacheStats, Clock, LookupKind, SystemClock, VerificationCache};
use crate::config::{
    AppConfig, CacheConfig, ContractAnalyzerConfig, CreatorAnalyzerConfig,
    LiquidityAnalyzerConfig, SocialAnalyzerConfig, TransferAnalyzerConfig,
};
use crate::error::{EngineError, EngineResult, FetchError};
use crate::fetcher::RateLimitedFetcher;
use crate::metrics::MetricsState;
use crate::models::{
    AddressHistory, Chain, ChainFamily, CreatorProfile, FactorName, FactorResult, LiquidityState,
    OwnerStatus, RiskAssessment, SourceInfo, TokenLaunch,
};
use crate::sources::{
    ChainDataSource, DiscoveryCursor, KnownBadActorRegistry, SocialMetadataProvider,
};

/// Analyzer parameters, copied out of `AppConfig`
#[derive(Debug, Clone, Default)]
pub struct AnalyzerSettings {
    pub contract: ContractAnalyzerConfig,
    pub creator: CreatorAnalyzerConfig,
    pub liquidity: LiquidityAnalyzerConfig,
    pub transfer: TransferAnalyzerConfig,
    pub social: SocialAnalyzerConfig,
}

impl AnalyzerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            contract: config.contract.clone(),
            creator: config.creator.clone(),
            liquidity: config.liquidity.clone(),
            transfer: config.transfer.clone(),
            social: config.social.clone(),
        }
    }
}

/// Hit/miss counters for each engine cache
#[derive(Debug, Clone, Serialize)]
pub struct EngineCacheStats {
    pub bytecode: CacheStats,
    pub source: CacheStats,
    pub creator_history: CacheStats,
}

struct EngineCaches {
    bytecode: VerificationCache<Vec<u8>>,
    source: VerificationCache<Option<SourceInfo>>,
    creator_history: VerificationCache<AddressHistory>,
}

impl EngineCaches {
    fn build(capacity: usize, clock: &Arc<dyn Clock>, metrics: Option<&Arc<MetricsState>>) -> Self {
        fn one<V: Clone + Send>(
            capacity: usize,
            clock: &Arc<dyn Clock>,
            metrics: Option<&Arc<MetricsState>>,
        ) -> VerificationCache<V> {
            let cache = VerificationCache::with_clock(capacity, clock.clone());
            match metrics {
                Some(m) => cache.with_metrics(m.clone()),
                None => cache,
            }
        }
        Self {
            bytecode: one(capacity, clock, metrics),
            source: one(capacity, clock, metrics),
            creator_history: one(capacity, clock, metrics),
        }
    }
}

/// Produces one `RiskAssessment` per call to `assess`
pub struct RiskEngine {
    sources: HashMap<Chain, Arc<dyn ChainDataSource>>,
    social: Option<Arc<dyn SocialMetadataProvider>>,
    fetcher: Arc<RateLimitedFetcher>,
    aggregator: RiskAggregator,
    settings: AnalyzerSettings,
    cache_config: CacheConfig,
    clock: Arc<dyn Clock>,
    caches: EngineCaches,
    metrics: Option<Arc<MetricsState>>,
}

impl RiskEngine {
    /// Fails with `Configuration` on invalid weights or thresholds
    pub fn new(config: &AppConfig, fetcher: Arc<RateLimitedFetcher>) -> EngineResult<Self> {
        let aggregator = RiskAggregator::new(config.weights, config.levels)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Ok(Self {
            sources: HashMap::new(),
            social: None,
            fetcher,
            aggregator,
            settings: AnalyzerSettings::from_config(config),
            cache_config: config.cache.clone(),
            caches: EngineCaches::build(config.cache.capacity, &clock, None),
            clock,
            metrics: None,
        })
    }

    /// Register the data source for its chain, replacing any previous one
    pub fn with_source(mut self, source: Arc<dyn ChainDataSource>) -> Self {
        self.sources.insert(source.chain(), source);
        self
    }

    pub fn with_social_provider(mut self, provider: Arc<dyn SocialMetadataProvider>) -> Self {
        self.social = Some(provider);
        self
    }

    /// Replace the cache clock. Drops anything already cached.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.rebuild_caches();
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsState>) -> Self {
        self.metrics = Some(metrics);
        self.rebuild_caches();
        self
    }

    fn rebuild_caches(&mut self) {
        self.caches = EngineCaches::build(
            self.cache_config.capacity,
            &self.clock,
            self.metrics.as_ref(),
        );
    }

    pub fn chains(&self) -> Vec<Chain> {
        let mut chains: Vec<Chain> = self.sources.keys().copied().collect();
        chains.sort();
        chains
    }

    pub fn aggregator(&self) -> &RiskAggregator {
        &self.aggregator
    }

    pub fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            bytecode: self.caches.bytecode.stats(),
            source: self.caches.source.stats(),
            creator_history: self.caches.creator_history.stats(),
        }
    }

    /// Drop every cached lookup for `address`
    pub fn invalidate(&self, chain: Chain, address: &str) {
        self.caches
            .bytecode
            .invalidate(&CacheKey::new(chain, address, LookupKind::Bytecode));
        self.caches
            .source
            .invalidate(&CacheKey::new(chain, address, LookupKind::Source));
        self.caches
            .creator_history
            .invalidate(&CacheKey::new(chain, address, LookupKind::CreatorHistory));
    }

    fn source(&self, chain: Chain) -> EngineResult<&Arc<dyn ChainDataSource>> {
        self.sources
            .get(&chain)
            .ok_or_else(|| EngineError::Permanent(format!("unsupported chain: {}", chain)))
    }

    /// Assess one token launch.
    ///
    /// Returns `Permanent` for a malformed address or a chain with no
    /// registered source. Every other failure is absorbed into the factor
    /// it affected.
    pub async fn assess(
        &self,
        launch: &TokenLaunch,
        registry: &dyn KnownBadActorRegistry,
    ) -> EngineResult<RiskAssessment> {
        let started = Instant::now();
        let chain = launch.chain;
        let source = self.source(chain)?;
        let address = chain.normalize_address(&launch.address)?;

        let creator_address = match &launch.creator {
            Some(raw) => match chain.normalize_address(raw) {
                Ok(creator) => Some(creator),
                Err(e) => {
                    warn!(chain = %chain, token = %address, error = %e, "Ignoring malformed creator address");
                    None
                }
            },
            None => self
                .resolve_creator(source, &address)
                .await
                .and_then(|c| chain.normalize_address(&c).ok()),
        };

        let (contract, creator, liquidity, transfer, social) = tokio::join!(
            self.contract_factor(source, &address),
            self.creator_factor(source, creator_address.as_deref(), launch.discovered_at, registry),
            self.liquidity_factor(source, &address, launch.pool_address.as_deref()),
            self.transfer_factor(source, &address),
            self.social_factor(chain, &address, launch.name.as_deref(), launch.symbol.as_deref()),
        );

        let factors: BTreeMap<FactorName, FactorResult> = [
            (FactorName::Contract, contract),
            (FactorName::Creator, creator),
            (FactorName::Liquidity, liquidity),
            (FactorName::Transfer, transfer),
            (FactorName::Social, social),
        ]
        .into_iter()
        .collect();

        let assessment = self.aggregator.aggregate(&factors);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if let Some(m) = &self.metrics {
            m.assessments
                .with_label_values(&[chain.as_str(), assessment.level.as_str()])
                .inc();
            m.assessment_latency.observe(elapsed_ms as f64);
        }

        info!(
            chain = %chain,
            token = %address,
            score = assessment.score,
            level = %assessment.level,
            partial = assessment.is_partial(),
            overrides = assessment.overrides.len(),
            elapsed_ms = elapsed_ms,
            "Assessment complete"
        );

        Ok(assessment)
    }

    /// Newly deployed tokens on `chain` since `cursor`
    pub async fn discover(
        &self,
        chain: Chain,
        cursor: &mut DiscoveryCursor,
    ) -> EngineResult<Vec<TokenLaunch>> {
        let source = self.source(chain)?;
        let cell = tokio::sync::Mutex::new(std::mem::take(cursor));

        let result = self
            .fetcher
            .fetch(chain, source.provider(LookupKind::Discovery), || async {
                let mut guard = cell.lock().await;
                source.discover_new_tokens(&mut *guard).await
            })
            .await;
        *cursor = cell.into_inner();

        let launches = result?;
        if let Some(m) = &self.metrics {
            m.tokens_discovered
                .with_label_values(&[chain.as_str()])
                .inc_by(launches.len() as u64);
        }
        Ok(launches)
    }

    async fn resolve_creator(
        &self,
        source: &Arc<dyn ChainDataSource>,
        address: &str,
    ) -> Option<String> {
        let chain = source.chain();
        match self
            .fetcher
            .fetch(chain, source.provider(LookupKind::Creator), || {
                source.get_creator(address)
            })
            .await
        {
            Ok(creator) => creator,
            Err(e) => {
                debug!(chain = %chain, token = %address, error = %e, "Creator lookup failed");
                None
            }
        }
    }

    async fn bytecode(
        &self,
        source: &Arc<dyn ChainDataSource>,
        address: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let chain = source.chain();
        let load = || {
            self.fetcher
                .fetch(chain, source.provider(LookupKind::Bytecode), || {
                    source.get_bytecode(address)
                })
        };

        // Mint authorities change after launch; only EVM code is immutable
        if chain.family() == ChainFamily::Solana {
            return load().await;
        }
        self.caches
            .bytecode
            .get_or_compute(
                CacheKey::new(chain, address, LookupKind::Bytecode),
                load,
                Duration::seconds(self.cache_config.contract_ttl_secs as i64),
            )
            .await
    }

    async fn source_info(
        &self,
        source: &Arc<dyn ChainDataSource>,
        address: &str,
    ) -> Result<Option<SourceInfo>, FetchError> {
        let chain = source.chain();
        self.caches
            .source
            .get_or_compute(
                CacheKey::new(chain, address, LookupKind::Source),
                || async {
                    match self
                        .fetcher
                        .fetch(chain, source.provider(LookupKind::Source), || {
                            source.get_source(address)
                        })
                        .await
                    {
                        Err(FetchError::NotFound(_)) => Ok(None),
                        other => other,
                    }
                },
                Duration::seconds(self.cache_config.contract_ttl_secs as i64),
            )
            .await
    }

    async fn contract_factor(&self, source: &Arc<dyn ChainDataSource>, address: &str) -> FactorResult {
        let chain = source.chain();
        let config = &self.settings.contract;

        let owner_lookup = async {
            self.fetcher
                .fetch(chain, source.provider(LookupKind::Owner), || source.get_owner(address))
                .await
        };
        let (bytecode, source_info, owner) = tokio::join!(
            self.bytecode(source, address),
            self.source_info(source, address),
            owner_lookup,
        );

        let bytecode = match bytecode {
            Ok(code) if !code.is_empty() => code,
            Ok(_) => {
                warn!(chain = %chain, token = %address, "No contract code at address");
                return FactorResult::degraded(config.neutral_score, "no contract code at address");
            }
            Err(e) => {
                warn!(chain = %chain, token = %address, error = %e, "Contract factor degraded");
                return FactorResult::degraded(
                    config.neutral_score,
                    format!("contract data unavailable: {}", e),
                );
            }
        };

        let mut unavailable = Vec::new();
        let source_info = source_info.unwrap_or_else(|e| {
            unavailable.push(format!("source lookup failed, bytecode scan only: {}", e));
            None
        });
        let owner = owner.unwrap_or_else(|e| {
            debug!(chain = %chain, token = %address, error = %e, "Owner lookup failed");
            OwnerStatus::Unknown
        });

        let signals =
            analyzers::detect_signals(chain.family(), &bytecode, source_info.as_ref(), &owner);
        let mut result = analyzers::score_contract(&signals, config);
        result.reasons.extend(unavailable);
        result
    }

    async fn creator_factor(
        &self,
        source: &Arc<dyn ChainDataSource>,
        creator: Option<&str>,
        launched_at: DateTime<Utc>,
        registry: &dyn KnownBadActorRegistry,
    ) -> FactorResult {
        let chain = source.chain();
        let config = &self.settings.creator;
        let Some(creator) = creator else {
            return FactorResult::degraded(config.neutral_score, "creator address unknown");
        };
        let window = Duration::hours(config.deployment_window_hours);

        if registry.is_flagged(creator) {
            warn!(chain = %chain, creator = %creator, "Creator is a known bad actor");
            let profile = CreatorProfile::from_history(
                creator,
                &AddressHistory::default(),
                true,
                window,
                launched_at,
            );
            return analyzers::score_creator(&profile, config);
        }

        let history = self
            .caches
            .creator_history
            .get_or_compute(
                CacheKey::new(chain, creator, LookupKind::CreatorHistory),
                || {
                    self.fetcher
                        .fetch(chain, source.provider(LookupKind::CreatorHistory), || {
                            source.get_address_history(creator)
                        })
                },
                Duration::seconds(self.cache_config.creator_ttl_secs as i64),
            )
            .await;

        match history {
            Ok(history) => {
                let profile =
                    CreatorProfile::from_history(creator, &history, false, window, launched_at);
                analyzers::score_creator(&profile, config)
            }
            Err(e) => {
                warn!(chain = %chain, creator = %creator, error = %e, "Creator factor degraded");
                FactorResult::degraded(
                    config.neutral_score,
                    format!("creator history unavailable: {}", e),
                )
            }
        }
    }

    async fn liquidity_factor(
        &self,
        source: &Arc<dyn ChainDataSource>,
        address: &str,
        pool_hint: Option<&str>,
    ) -> FactorResult {
        let chain = source.chain();
        let config = &self.settings.liquidity;
        let pool = self
            .fetcher
            .fetch(chain, source.provider(LookupKind::LiquidityPool), || {
                source.get_liquidity_pool(address, pool_hint)
            })
            .await;

        match pool {
            Ok(pool) => {
                let state = pool.as_ref().map(LiquidityState::from);
                analyzers::score_liquidity(state.as_ref(), chain.native_symbol(), config)
            }
            Err(e) => {
                warn!(chain = %chain, token = %address, error = %e, "Liquidity factor degraded");
                FactorResult::degraded(
                    config.missing_pool_score,
                    format!("liquidity data unavailable: {}", e),
                )
            }
        }
    }

    async fn transfer_factor(&self, source: &Arc<dyn ChainDataSource>, address: &str) -> FactorResult {
        let chain = source.chain();
        let config = &self.settings.transfer;
        let events = self
            .fetcher
            .fetch(chain, source.provider(LookupKind::TransferEvents), || {
                source.get_transfer_events(address, config.max_transfer_history)
            })
            .await;

        match events {
            Ok(events) => {
                let pattern = analyzers::analyze_transfers(&events, config);
                debug!(
                    chain = %chain,
                    token = %address,
                    transfers = pattern.total_transfers_sampled,
                    holders = pattern.unique_holders,
                    wash = pattern.wash_trade_score,
                    round_trips = pattern.rapid_buy_sell_count,
                    "Transfer pattern"
                );
                analyzers::score_transfers(&pattern, config)
            }
            Err(e) => {
                warn!(chain = %chain, token = %address, error = %e, "Transfer factor degraded");
                FactorResult::degraded(
                    config.abstain_score,
                    format!("transfer history unavailable: {}", e),
                )
            }
        }
    }

    async fn social_factor(
        &self,
        chain: Chain,
        address: &str,
        name: Option<&str>,
        symbol: Option<&str>,
    ) -> FactorResult {
        let config = &self.settings.social;
        let Some(provider) = &self.social else {
            return analyzers::score_social(None, name, symbol, config);
        };

        let metadata = self
            .fetcher
            .fetch(chain, provider.name(), || provider.lookup(chain, address))
            .await;

        match metadata {
            Ok(metadata) => analyzers::score_social(metadata.as_ref(), name, symbol, config),
            Err(e) => {
                debug!(chain = %chain, token = %address, error = %e, "Social lookup failed");
                FactorResult::degraded(
                    config.missing_score,
                    format!("social metadata unavailable: {}", e),
                )
            }
        }
    }
}
