//! Verdict notifications
//!
//! The engine emits a `VerdictEvent` whenever a verdict reaches the alert
//! threshold. Delivery is up to the `Notifier` implementations:
//! - `LogNotifier` writes alerts through tracing
//! - `ChannelNotifier` forwards events to an in-process consumer

pub mod channel;
pub mod log;

pub use self::channel::ChannelNotifier;
pub use self::log::LogNotifier;

use std::sync::Arc;

use crate::models::{RiskAssessment, RiskLevel, TokenLaunch};

/// A verdict ready for delivery
#[derive(Debug, Clone)]
pub struct VerdictEvent {
    pub launch: TokenLaunch,
    pub assessment: RiskAssessment,
    pub epoch: u32,
}

impl VerdictEvent {
    pub fn level(&self) -> RiskLevel {
        self.assessment.level
    }

    /// One-line summary with the top reasons
    pub fn format_message(&self) -> String {
        let marker = match self.assessment.level {
            RiskLevel::Critical => "🚨",
            RiskLevel::High => "⚠️",
            RiskLevel::Medium => "🔎",
            RiskLevel::Low => "✅",
        };
        let top: Vec<&str> = self
            .assessment
            .overrides
            .iter()
            .chain(self.assessment.contributing_reasons.iter())
            .take(3)
            .map(String::as_str)
            .collect();
        format!(
            "{} {} {} on {} (score {:.2}): {}",
            marker,
            self.assessment.level,
            self.launch.label(),
            self.launch.chain,
            self.assessment.score,
            top.join("; ")
        )
    }
}

/// Verdict sink
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, event: &VerdictEvent) -> anyhow::Result<()>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Fans events out to every enabled notifier at or above `min_level`
pub struct CompositeNotifier {
    services: Vec<Arc<dyn Notifier>>,
    min_level: RiskLevel,
}

impl CompositeNotifier {
    pub fn new(min_level: RiskLevel) -> Self {
        Self {
            services: Vec::new(),
            min_level,
        }
    }

    pub fn add_service(&mut self, service: Arc<dyn Notifier>) {
        self.services.push(service);
    }

    pub fn min_level(&self) -> RiskLevel {
        self.min_level
    }

    pub fn should_notify(&self, level: RiskLevel) -> bool {
        level >= self.min_level
    }

    /// Deliver to all services; a failing service does not stop the others
    pub async fn notify(&self, event: &VerdictEvent) {
        if !self.should_notify(event.level()) {
            return;
        }
        for service in &self.services {
            if !service.is_enabled() {
                continue;
            }
            if let Err(e) = service.notify(event).await {
                tracing::error!(
                    error = %e,
                    notifier = service.name(),
                    token = %event.launch.address,
                    "Failed to send notification"
                );
            }
        }
    }
}

impl Default for CompositeNotifier {
    fn default() -> Self {
        Self::new(RiskLevel::High)
    }
}
