//! Rate-Limited Fetcher Unit Tests
//!
//! Tests the fetch policy end to end:
//! - Retry budget and the DataUnavailable surface
//! - Non-retryable failures fail fast
//! - Per-chain concurrency ceiling queues instead of failing
//! - Metrics record outcomes and retries

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use launchguard::error::FetchError;
use launchguard::fetcher::{ProviderThrottle, RateLimitedFetcher, RetryPolicy};
use launchguard::metrics::MetricsState;
use launchguard::models::Chain;

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(8),
        jitter: false,
        request_timeout: Duration::from_secs(30),
    }
}

/// A persistently failing provider is tried 1 + max_retries times
#[tokio::test(start_paused = true)]
async fn test_transient_exhaustion_reports_attempts() {
    let fetcher = RateLimitedFetcher::new(10, ProviderThrottle::unthrottled(), policy(3));
    let calls = AtomicUsize::new(0);

    let result: Result<(), FetchError> = fetcher
        .fetch(Chain::Ethereum, "rpc", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::transient("rpc", "HTTP 502"))
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    match result {
        Err(FetchError::DataUnavailable { attempts, last }) => {
            assert_eq!(attempts, 4);
            assert!(last.contains("502"));
        }
        other => panic!("expected DataUnavailable, got {:?}", other),
    }
}

/// Backoff waits 500ms, 1s, 2s between the four attempts
#[tokio::test(start_paused = true)]
async fn test_backoff_schedule_is_exponential() {
    let fetcher = RateLimitedFetcher::new(10, ProviderThrottle::unthrottled(), policy(3));
    let started = tokio::time::Instant::now();

    let _: Result<(), FetchError> = fetcher
        .fetch(Chain::Base, "rpc", || async {
            Err(FetchError::transient("rpc", "timeout"))
        })
        .await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(3_500));
    assert!(elapsed < Duration::from_millis(3_600));
}

/// Permanent and NotFound failures are never retried
#[tokio::test(start_paused = true)]
async fn test_non_retryable_fail_fast() {
    let fetcher = RateLimitedFetcher::new(10, ProviderThrottle::unthrottled(), policy(3));

    for err in [
        FetchError::Permanent("malformed address".to_string()),
        FetchError::NotFound("no such contract".to_string()),
    ] {
        let calls = AtomicUsize::new(0);
        let result: Result<(), FetchError> = fetcher
            .fetch(Chain::Ethereum, "explorer", || {
                calls.fetch_add(1, Ordering::SeqCst);
                let err = err.clone();
                async move { Err(err) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err(), err);
    }
}

/// More concurrent requests than permits queue; none fail and the ceiling holds
#[tokio::test(start_paused = true)]
async fn test_concurrency_ceiling_per_chain() {
    let fetcher = Arc::new(RateLimitedFetcher::new(
        2,
        ProviderThrottle::unthrottled(),
        policy(0),
    ));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..8u64 {
        let fetcher = fetcher.clone();
        let in_flight = in_flight.clone();
        let peak = peak.clone();
        handles.push(tokio::spawn(async move {
            fetcher
                .fetch(Chain::Solana, "rpc", || {
                    let in_flight = in_flight.clone();
                    let peak = peak.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, FetchError>(i)
                    }
                })
                .await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }
    results.sort();
    assert_eq!(results, (0..8).collect::<Vec<_>>());
    assert_eq!(peak.load(Ordering::SeqCst), 2);

    // Another chain has its own permits
    assert_eq!(fetcher.available_permits(Chain::Ethereum), 2);
}

/// Requests to one provider are spaced by its configured interval
#[tokio::test(start_paused = true)]
async fn test_provider_spacing_applies_across_calls() {
    let throttle = ProviderThrottle::new(
        Duration::ZERO,
        HashMap::from([("explorer".to_string(), Duration::from_millis(200))]),
    );
    let fetcher = RateLimitedFetcher::new(10, throttle, policy(0));
    let started = tokio::time::Instant::now();

    for _ in 0..5 {
        let _ = fetcher
            .fetch(Chain::Ethereum, "explorer", || async { Ok::<_, FetchError>(()) })
            .await;
    }

    assert!(started.elapsed() >= Duration::from_millis(800));
}

/// Outcomes and retries land in the labelled counters
#[tokio::test(start_paused = true)]
async fn test_metrics_record_outcomes() {
    let metrics = Arc::new(MetricsState::new());
    let fetcher = RateLimitedFetcher::new(10, ProviderThrottle::unthrottled(), policy(2))
        .with_metrics(metrics.clone());
    let calls = AtomicUsize::new(0);

    let result = fetcher
        .fetch(Chain::Arbitrum, "rpc", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FetchError::transient("rpc", "reset"))
            } else {
                Ok(7u8)
            }
        })
        .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(metrics.fetch_total.with_label_values(&["arbitrum", "ok"]).get(), 1);
    assert_eq!(metrics.fetch_retries.with_label_values(&["arbitrum"]).get(), 1);
}
