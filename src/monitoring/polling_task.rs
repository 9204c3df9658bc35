//! Per-chain discovery loop
//!
//! Polls one chain for new token launches and feeds them through the
//! assessment pipeline with bounded concurrency. On cancellation the loop
//! stops discovering, gives in-flight assessments a grace period, then
//! abandons the rest with an incomplete marker.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::{ChainConfig, MonitoringConfig};
use crate::engine::AssessmentPipeline;
use crate::error::EngineResult;
use crate::models::{AssessmentRecord, Chain, TokenLaunch};
use crate::sources::DiscoveryCursor;

pub const SHUTDOWN_REASON: &str = "shutdown before assessment completed";

/// Configuration for one chain monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub chain: Chain,
    /// Interval between discovery cycles
    pub poll_interval: Duration,
    /// Assessments running at once on this chain
    pub max_concurrent_assessments: usize,
    /// Time in-flight assessments get to finish after cancellation
    pub shutdown_grace: Duration,
}

impl MonitorConfig {
    pub fn from_config(chain: &ChainConfig, monitoring: &MonitoringConfig) -> Self {
        Self {
            chain: chain.chain,
            poll_interval: Duration::from_secs(chain.poll_interval_secs),
            max_concurrent_assessments: monitoring.max_concurrent_assessments.max(1),
            shutdown_grace: Duration::from_secs(monitoring.shutdown_grace_secs),
        }
    }
}

/// What a monitor did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub discovered: u64,
    pub assessed: u64,
    pub failed: u64,
    pub incomplete: u64,
}

type InFlight = Arc<Mutex<HashMap<String, TokenLaunch>>>;
type AssessmentOutcome = EngineResult<AssessmentRecord>;

/// Run the discovery loop for one chain until `cancel_token` fires
pub async fn run_chain_monitor(
    pipeline: AssessmentPipeline,
    config: MonitorConfig,
    cancel_token: CancellationToken,
) -> MonitorSummary {
    let chain = config.chain;
    tracing::info!(
        chain = %chain,
        poll_interval_secs = config.poll_interval.as_secs(),
        max_concurrent = config.max_concurrent_assessments,
        "Starting chain monitor"
    );

    let mut cursor = DiscoveryCursor::new();
    let mut queue: VecDeque<TokenLaunch> = VecDeque::new();
    let mut tasks: JoinSet<AssessmentOutcome> = JoinSet::new();
    let in_flight: InFlight = Arc::new(Mutex::new(HashMap::new()));
    let mut summary = MonitorSummary::default();

    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        while tasks.len() < config.max_concurrent_assessments {
            let Some(launch) = queue.pop_front() else {
                break;
            };
            spawn_assessment(&mut tasks, &pipeline, &in_flight, launch);
        }

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                tracing::info!(chain = %chain, "Chain monitor shutting down");
                break;
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                handle_joined(chain, joined, &mut summary);
            }
            _ = interval.tick() => {
                let discovered = tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!(chain = %chain, "Chain monitor shutting down during discovery");
                        break;
                    }
                    result = pipeline.engine().discover(chain, &mut cursor) => result,
                };

                let launches = match discovered {
                    Ok(launches) => launches,
                    Err(e) => {
                        tracing::warn!(chain = %chain, error = %e, "Discovery failed, skipping cycle");
                        continue;
                    }
                };

                for launch in launches {
                    match pipeline.store().is_known(launch.chain, &launch.address).await {
                        Ok(true) => {
                            tracing::debug!(chain = %chain, token = %launch.address, "Already assessed, skipping");
                            continue;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            tracing::warn!(chain = %chain, token = %launch.address, error = %e, "Store lookup failed, assessing anyway");
                        }
                    }
                    summary.discovered += 1;
                    queue.push_back(launch);
                }

                if !queue.is_empty() {
                    tracing::debug!(chain = %chain, queued = queue.len(), running = tasks.len(), "Launches waiting for assessment");
                }
            }
        }
    }

    drain(&pipeline, &config, &mut tasks, &in_flight, queue, &mut summary).await;

    tracing::info!(
        chain = %chain,
        discovered = summary.discovered,
        assessed = summary.assessed,
        failed = summary.failed,
        incomplete = summary.incomplete,
        "Chain monitor stopped"
    );
    summary
}

fn spawn_assessment(
    tasks: &mut JoinSet<AssessmentOutcome>,
    pipeline: &AssessmentPipeline,
    in_flight: &InFlight,
    launch: TokenLaunch,
) {
    let key = launch.key();
    in_flight.lock().insert(key.clone(), launch.clone());

    let pipeline = pipeline.clone();
    let in_flight = in_flight.clone();
    tasks.spawn(async move {
        let result = pipeline.process(launch).await;
        in_flight.lock().remove(&key);
        result
    });
}

fn handle_joined(
    chain: Chain,
    joined: Result<AssessmentOutcome, JoinError>,
    summary: &mut MonitorSummary,
) {
    match joined {
        Ok(Ok(record)) => {
            summary.assessed += 1;
            tracing::debug!(
                chain = %chain,
                token = %record.launch.address,
                level = %record.assessment.level,
                epoch = record.epoch,
                "Assessment stored"
            );
        }
        // The pipeline already recorded the failure marker
        Ok(Err(_)) => summary.failed += 1,
        Err(e) if e.is_cancelled() => {}
        Err(e) => {
            tracing::error!(chain = %chain, error = %e, "Assessment task panicked");
        }
    }
}

/// Wait out the grace period, then abandon whatever is still running
async fn drain(
    pipeline: &AssessmentPipeline,
    config: &MonitorConfig,
    tasks: &mut JoinSet<AssessmentOutcome>,
    in_flight: &InFlight,
    queue: VecDeque<TokenLaunch>,
    summary: &mut MonitorSummary,
) {
    let chain = config.chain;
    let finished = tokio::time::timeout(config.shutdown_grace, async {
        while let Some(joined) = tasks.join_next().await {
            handle_joined(chain, joined, summary);
        }
    })
    .await;

    if finished.is_err() {
        tracing::warn!(
            chain = %chain,
            running = tasks.len(),
            "Grace period elapsed, abandoning in-flight assessments"
        );
        tasks.abort_all();
        while let Some(joined) = tasks.join_next().await {
            handle_joined(chain, joined, summary);
        }
    }

    let abandoned: Vec<TokenLaunch> = in_flight.lock().drain().map(|(_, launch)| launch).collect();
    for launch in abandoned.iter().chain(queue.iter()) {
        pipeline.mark_incomplete(launch, SHUTDOWN_REASON).await;
        summary.incomplete += 1;
    }
}
