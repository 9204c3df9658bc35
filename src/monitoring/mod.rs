//! Launch monitoring
//!
//! One polling loop per enabled chain, all sharing one assessment pipeline
//! and one cancellation token.

pub mod polling_task;

pub use polling_task::{run_chain_monitor, MonitorConfig, MonitorSummary, SHUTDOWN_REASON};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::engine::AssessmentPipeline;

/// Spawn a monitor for every enabled chain the engine has a data source for
pub fn start_monitors(
    pipeline: &AssessmentPipeline,
    config: &AppConfig,
    cancel_token: &CancellationToken,
) -> Vec<JoinHandle<MonitorSummary>> {
    let supported = pipeline.engine().chains();

    config
        .enabled_chains()
        .filter(|chain_cfg| {
            let ok = supported.contains(&chain_cfg.chain);
            if !ok {
                tracing::warn!(chain = %chain_cfg.chain, "No data source for chain, not monitoring");
            }
            ok
        })
        .map(|chain_cfg| {
            let monitor_cfg = MonitorConfig::from_config(chain_cfg, &config.monitoring);
            tokio::spawn(run_chain_monitor(
                pipeline.clone(),
                monitor_cfg,
                cancel_token.child_token(),
            ))
        })
        .collect()
}
