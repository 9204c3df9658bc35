//! Tracing-backed notifier
//!
//! Rate limited per token so a re-assessed token does not repeat its alert
//! on every epoch.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::{Notifier, VerdictEvent};
use crate::models::RiskLevel;

/// Last alert per (chain, token, level)
struct RateLimiter {
    last_sent: RwLock<HashMap<String, Instant>>,
    interval: Duration,
}

impl RateLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            last_sent: RwLock::new(HashMap::new()),
            interval,
        }
    }

    /// Claim the slot for `key`; false if it was used within the interval
    fn try_acquire(&self, key: &str) -> bool {
        let mut last_sent = self.last_sent.write();
        match last_sent.get(key) {
            Some(last) if last.elapsed() < self.interval => false,
            _ => {
                last_sent.insert(key.to_string(), Instant::now());
                true
            }
        }
    }
}

pub struct LogNotifier {
    enabled: bool,
    limiter: RateLimiter,
}

impl LogNotifier {
    pub fn new(enabled: bool, repeat_interval: Duration) -> Self {
        Self {
            enabled,
            limiter: RateLimiter::new(repeat_interval),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, event: &VerdictEvent) -> anyhow::Result<()> {
        let key = format!(
            "{}:{}:{}",
            event.launch.chain, event.launch.address, event.assessment.level
        );
        if !self.limiter.try_acquire(&key) {
            tracing::debug!(token = %event.launch.address, "Alert suppressed, sent recently");
            return Ok(());
        }

        let message = event.format_message();
        match event.level() {
            RiskLevel::Critical => tracing::error!(
                chain = %event.launch.chain,
                token = %event.launch.address,
                score = event.assessment.score,
                epoch = event.epoch,
                "{}", message
            ),
            _ => tracing::warn!(
                chain = %event.launch.chain,
                token = %event.launch.address,
                score = event.assessment.score,
                epoch = event.epoch,
                "{}", message
            ),
        }
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
