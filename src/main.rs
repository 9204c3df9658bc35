//! LaunchGuard - risk assessment for newly launched tokens
//!
//! This is the main entry point for the service. It wires the data sources
//! into the engine, starts one monitor per chain and serves the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use launchguard::config::AppConfig;
use launchguard::db::SqliteAssessmentStore;
use launchguard::engine::{AssessmentPipeline, RiskEngine};
use launchguard::fetcher::RateLimitedFetcher;
use launchguard::handlers::{self, AppState};
use launchguard::metrics::MetricsState;
use launchguard::models::ChainFamily;
use launchguard::monitoring;
use launchguard::notifications::{CompositeNotifier, LogNotifier};
use launchguard::sources::{
    http_client, ChainDataSource, DexScreenerClient, DexScreenerSocialProvider, EvmDataSource,
    SolanaDataSource, StaticBadActorRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting LaunchGuard v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        chains = config.enabled_chains().count(),
        "Configuration loaded"
    );

    let metrics = Arc::new(MetricsState::new());

    // Result store
    let store = Arc::new(SqliteAssessmentStore::open(&config.database).await?);
    tracing::info!(path = %config.database.path.display(), "Result store initialized");

    // Data sources
    let http = http_client(Duration::from_secs(config.fetcher.request_timeout_secs));
    let dexscreener = DexScreenerClient::new(http.clone(), config.providers.dexscreener_url.clone());
    let lock_threshold = config.liquidity.lock_share_threshold;

    let fetcher = Arc::new(RateLimitedFetcher::from_config(&config.fetcher).with_metrics(metrics.clone()));
    let mut engine = RiskEngine::new(&config, fetcher)?
        .with_social_provider(Arc::new(DexScreenerSocialProvider::new(dexscreener.clone())))
        .with_metrics(metrics.clone());

    for chain_cfg in config.enabled_chains() {
        let source: Arc<dyn ChainDataSource> = match chain_cfg.chain.family() {
            ChainFamily::Evm => Arc::new(EvmDataSource::new(
                chain_cfg,
                http.clone(),
                dexscreener.clone(),
                lock_threshold,
            )),
            ChainFamily::Solana => Arc::new(SolanaDataSource::new(
                &chain_cfg.rpc_url,
                http.clone(),
                dexscreener.clone(),
                &config.providers.helius_url,
                chain_cfg.helius_api_key.clone(),
                &config.providers.rugcheck_url,
                lock_threshold,
            )),
        };
        engine = engine.with_source(source);
        tracing::info!(chain = %chain_cfg.chain, rpc_url = %chain_cfg.rpc_url, "Data source configured");
    }
    let engine = Arc::new(engine);

    let registry = Arc::new(StaticBadActorRegistry::new(&config.known_bad_actors));
    tracing::info!(flagged = registry.len(), "Known bad actor registry loaded");

    let mut notifier = CompositeNotifier::new(config.alerts.min_level);
    notifier.add_service(Arc::new(LogNotifier::new(
        config.alerts.log_alerts,
        Duration::from_secs(config.alerts.repeat_interval_secs),
    )));

    let pipeline = AssessmentPipeline::new(engine, store, registry, Arc::new(notifier))
        .with_metrics(metrics.clone());

    // Monitors
    let cancel_token = CancellationToken::new();
    let monitors = monitoring::start_monitors(&pipeline, &config, &cancel_token);
    tracing::info!(count = monitors.len(), "Chain monitors started");

    // HTTP
    let app = handlers::router(Arc::new(AppState::new(pipeline)), metrics);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = cancel_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    cancel_token.cancel();
    for joined in join_all(monitors).await {
        match joined {
            Ok(summary) => tracing::debug!(?summary, "Monitor joined"),
            Err(e) => tracing::error!(error = %e, "Monitor task failed"),
        }
    }

    tracing::info!("LaunchGuard stopped");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,launchguard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Load and validate configuration
fn load_config() -> anyhow::Result<AppConfig> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    Ok(config)
}
