//! Per-provider request spacing
//!
//! Each provider gets a minimum interval between requests. Callers reserve
//! the next free slot under a lock and then sleep until it arrives, so
//! concurrent callers queue in arrival order instead of bursting.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Minimum-interval throttle keyed by provider name
pub struct ProviderThrottle {
    default_interval: Duration,
    intervals: HashMap<String, Duration>,
    /// Earliest instant the next request to each provider may start
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl ProviderThrottle {
    /// # Arguments
    /// * `default_interval` - Spacing for providers without an override
    /// * `intervals` - Per-provider spacing overrides
    pub fn new(default_interval: Duration, intervals: HashMap<String, Duration>) -> Self {
        Self {
            default_interval,
            intervals,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Build from millisecond settings
    pub fn from_millis(default_ms: u64, intervals_ms: &HashMap<String, u64>) -> Self {
        let intervals = intervals_ms
            .iter()
            .map(|(k, v)| (k.clone(), Duration::from_millis(*v)))
            .collect();
        Self::new(Duration::from_millis(default_ms), intervals)
    }

    pub fn unthrottled() -> Self {
        Self::new(Duration::ZERO, HashMap::new())
    }

    pub fn interval_for(&self, provider: &str) -> Duration {
        self.intervals
            .get(provider)
            .copied()
            .unwrap_or(self.default_interval)
    }

    /// Reserve a request slot for `provider`, returning how long the caller
    /// must wait before sending
    pub fn reserve(&self, provider: &str) -> Duration {
        let interval = self.interval_for(provider);
        if interval.is_zero() {
            return Duration::ZERO;
        }

        let now = Instant::now();
        let mut slots = self.next_slot.lock();
        let slot = slots
            .get(provider)
            .copied()
            .filter(|next| *next > now)
            .unwrap_or(now);
        slots.insert(provider.to_string(), slot + interval);
        slot - now
    }

    /// Wait for a request slot for `provider`
    pub async fn acquire(&self, provider: &str) {
        let wait = self.reserve(provider);
        if !wait.is_zero() {
            tracing::trace!(provider = provider, wait_ms = wait.as_millis() as u64, "Throttling request");
            sleep_until(Instant::now() + wait).await;
        }
    }
}
