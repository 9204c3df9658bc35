//! Rate-limited, retrying access to external data
//!
//! Every `ChainDataSource` call made by the engine goes through
//! [`RateLimitedFetcher::fetch`], which enforces:
//! - a per-chain concurrency ceiling (excess requests queue, never fail)
//! - a minimum interval between requests to the same provider
//! - a per-attempt timeout
//! - exponential backoff retries on transient and rate-limit failures

pub mod rate_limiter;

pub use rate_limiter::ProviderThrottle;

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::FetcherConfig;
use crate::error::FetchError;
use crate::metrics::MetricsState;
use crate::models::Chain;

/// Retry settings
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    /// Per-attempt timeout
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: true,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Delay before retry number `attempt` (0-based): base * 2^attempt,
    /// capped at `max_delay`, plus up to 50% jitter when enabled
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if self.jitter && !delay.is_zero() {
            let extra_ms = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 2);
            delay + Duration::from_millis(extra_ms)
        } else {
            delay
        }
    }
}

/// Wraps external lookups with concurrency limits, throttling and retries
pub struct RateLimitedFetcher {
    max_concurrent: usize,
    semaphores: Mutex<HashMap<Chain, Arc<Semaphore>>>,
    throttle: ProviderThrottle,
    policy: RetryPolicy,
    metrics: Option<Arc<MetricsState>>,
}

impl RateLimitedFetcher {
    pub fn new(max_concurrent: usize, throttle: ProviderThrottle, policy: RetryPolicy) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            semaphores: Mutex::new(HashMap::new()),
            throttle,
            policy,
            metrics: None,
        }
    }

    pub fn from_config(config: &FetcherConfig) -> Self {
        Self::new(
            config.max_concurrent_per_chain,
            ProviderThrottle::from_millis(
                config.default_min_interval_ms,
                &config.provider_min_interval_ms,
            ),
            RetryPolicy::from_config(config),
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsState>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn semaphore(&self, chain: Chain) -> Arc<Semaphore> {
        self.semaphores
            .lock()
            .entry(chain)
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_concurrent)))
            .clone()
    }

    /// Requests currently allowed to start on `chain`
    pub fn available_permits(&self, chain: Chain) -> usize {
        self.semaphore(chain).available_permits()
    }

    /// Run `request` against `provider` on `chain` under the fetch policy.
    ///
    /// `Permanent` and `NotFound` fail on the first attempt. `Transient`
    /// failures are retried `max_retries` times and then surface as
    /// `DataUnavailable`. `RateLimited` failures are retried the same way
    /// (honouring any retry-after hint) and surface as `RateLimited`.
    pub async fn fetch<T, F, Fut>(
        &self,
        chain: Chain,
        provider: &str,
        mut request: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let semaphore = self.semaphore(chain);
        let mut attempt: u32 = 0;

        loop {
            let result = {
                // Hold a permit only while the request is in flight, not while backing off
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| FetchError::Permanent("fetcher shut down".to_string()))?;
                self.throttle.acquire(provider).await;

                match tokio::time::timeout(self.policy.request_timeout, request()).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::transient(
                        provider,
                        format!("timed out after {:?}", self.policy.request_timeout),
                    )),
                }
            };

            let err = match result {
                Ok(value) => {
                    self.record(chain, "ok");
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                self.record(chain, err.kind());
                tracing::debug!(chain = %chain, provider = provider, error = %err, "Fetch failed permanently");
                return Err(err);
            }

            if attempt >= self.policy.max_retries {
                let attempts = attempt + 1;
                let surfaced = match err {
                    FetchError::RateLimited { .. } => err,
                    other => FetchError::DataUnavailable {
                        attempts,
                        last: other.to_string(),
                    },
                };
                self.record(chain, surfaced.kind());
                tracing::warn!(
                    chain = %chain,
                    provider = provider,
                    attempts = attempts,
                    error = %surfaced,
                    "Fetch retries exhausted"
                );
                return Err(surfaced);
            }

            let mut delay = self.policy.backoff(attempt);
            if let FetchError::RateLimited {
                retry_after: Some(hint),
                ..
            } = &err
            {
                delay = delay.max(*hint);
            }

            tracing::debug!(
                chain = %chain,
                provider = provider,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying fetch"
            );
            if let Some(m) = &self.metrics {
                m.fetch_retries.with_label_values(&[chain.as_str()]).inc();
            }

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn record(&self, chain: Chain, outcome: &str) {
        if let Some(m) = &self.metrics {
            m.fetch_total
                .with_label_values(&[chain.as_str(), outcome])
                .inc();
        }
    }
}
