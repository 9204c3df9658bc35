//! Assess, persist, notify
//!
//! Shared by the monitoring loops and the on-demand API. A verdict is
//! written only after aggregation completes; a failed analysis leaves an
//! aborted or incomplete marker instead, never a LOW verdict.

use std::sync::Arc;

use tracing::{error, warn};

use super::assessor::RiskEngine;
use crate::db::AssessmentStore;
use crate::error::{EngineError, EngineResult};
use crate::metrics::MetricsState;
use crate::models::{AssessmentRecord, FailureKind, TokenLaunch};
use crate::notifications::{CompositeNotifier, VerdictEvent};
use crate::sources::KnownBadActorRegistry;

#[derive(Clone)]
pub struct AssessmentPipeline {
    engine: Arc<RiskEngine>,
    store: Arc<dyn AssessmentStore>,
    registry: Arc<dyn KnownBadActorRegistry>,
    notifier: Arc<CompositeNotifier>,
    metrics: Option<Arc<MetricsState>>,
}

impl AssessmentPipeline {
    pub fn new(
        engine: Arc<RiskEngine>,
        store: Arc<dyn AssessmentStore>,
        registry: Arc<dyn KnownBadActorRegistry>,
        notifier: Arc<CompositeNotifier>,
    ) -> Self {
        Self {
            engine,
            store,
            registry,
            notifier,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsState>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn engine(&self) -> &Arc<RiskEngine> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn AssessmentStore> {
        &self.store
    }

    /// Canonical form of the launch addresses; left untouched if malformed
    /// so the engine can reject it
    fn normalized(launch: TokenLaunch) -> TokenLaunch {
        let mut launch = launch;
        if let Ok(address) = launch.chain.normalize_address(&launch.address) {
            launch.address = address;
        }
        if let Some(creator) = &launch.creator {
            if let Ok(creator) = launch.chain.normalize_address(creator) {
                launch.creator = Some(creator);
            }
        }
        launch
    }

    /// Assess one launch and persist the verdict
    pub async fn process(&self, launch: TokenLaunch) -> EngineResult<AssessmentRecord> {
        let launch = Self::normalized(launch);

        let assessment = match self.engine.assess(&launch, self.registry.as_ref()).await {
            Ok(assessment) => assessment,
            Err(e) => {
                self.record_failure(&launch, &e).await;
                return Err(e);
            }
        };

        let record = self.store.record(&launch, &assessment).await?;

        let event = VerdictEvent {
            launch: record.launch.clone(),
            assessment: record.assessment.clone(),
            epoch: record.epoch,
        };
        self.notifier.notify(&event).await;

        Ok(record)
    }

    /// Mark a launch whose analysis was abandoned (shutdown, cancellation)
    pub async fn mark_incomplete(&self, launch: &TokenLaunch, reason: &str) {
        self.count_failure(launch, FailureKind::Incomplete);
        if let Err(e) = self.store.record_incomplete(launch, reason).await {
            error!(chain = %launch.chain, token = %launch.address, error = %e, "Failed to record incomplete marker");
        }
    }

    async fn record_failure(&self, launch: &TokenLaunch, err: &EngineError) {
        let reason = err.to_string();
        let stored = if err.is_abort() {
            error!(
                chain = %launch.chain,
                token = %launch.address,
                error = %err,
                "Assessment aborted"
            );
            self.count_failure(launch, FailureKind::Aborted);
            self.store.record_aborted(launch, &reason).await
        } else {
            warn!(
                chain = %launch.chain,
                token = %launch.address,
                error = %err,
                "Assessment did not complete"
            );
            self.count_failure(launch, FailureKind::Incomplete);
            self.store.record_incomplete(launch, &reason).await
        };

        if let Err(e) = stored {
            error!(chain = %launch.chain, token = %launch.address, error = %e, "Failed to record failure marker");
        }
    }

    fn count_failure(&self, launch: &TokenLaunch, kind: FailureKind) {
        if let Some(m) = &self.metrics {
            m.assessments_failed
                .with_label_values(&[launch.chain.as_str(), &kind.to_string()])
                .inc();
        }
    }
}
