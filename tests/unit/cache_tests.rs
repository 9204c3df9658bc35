//! Verification Cache Unit Tests
//!
//! Tests the single-flight and TTL guarantees:
//! - Concurrent callers for one key share a single computation
//! - Distinct keys compute independently
//! - Entries expire after their TTL
//! - Eviction or invalidation mid-computation never duplicates work

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use launchguard::cache::{CacheKey, LookupKind, ManualClock, VerificationCache};
use launchguard::models::Chain;

fn key(address: &str) -> CacheKey {
    CacheKey::new(Chain::Ethereum, address, LookupKind::Bytecode)
}

/// Fifty concurrent readers of a cold key trigger exactly one computation
#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_compute_once() {
    let cache: Arc<VerificationCache<Vec<u8>>> = Arc::new(VerificationCache::new(100));
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..50 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_compute(
                    key("0xabc"),
                    || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(StdDuration::from_millis(200)).await;
                        Ok::<_, String>(vec![0x60, 0x80])
                    },
                    Duration::hours(24),
                )
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), vec![0x60, 0x80]);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 49);
}

/// A slow computation for one key does not block another key
#[tokio::test(start_paused = true)]
async fn test_distinct_keys_do_not_serialize() {
    let cache: Arc<VerificationCache<u32>> = Arc::new(VerificationCache::new(100));

    let slow = {
        let cache = cache.clone();
        tokio::spawn(async move {
            cache
                .get_or_compute(
                    key("0xslow"),
                    || async {
                        tokio::time::sleep(StdDuration::from_secs(60)).await;
                        Ok::<_, String>(1)
                    },
                    Duration::hours(1),
                )
                .await
        })
    };
    tokio::task::yield_now().await;

    let started = tokio::time::Instant::now();
    let fast = cache
        .get_or_compute(key("0xfast"), || async { Ok::<_, String>(2) }, Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(fast, 2);
    assert!(started.elapsed() < StdDuration::from_secs(1));

    assert_eq!(slow.await.unwrap().unwrap(), 1);
}

async fn read_counter(cache: &VerificationCache<u32>, calls: &AtomicUsize) -> u32 {
    cache
        .get_or_compute(
            key("0xttl"),
            || async { Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst) as u32) },
            Duration::hours(24),
        )
        .await
        .unwrap()
}

/// Entries are served until the TTL passes, then recomputed
#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let cache: VerificationCache<u32> = VerificationCache::with_clock(10, clock.clone());
    let calls = AtomicUsize::new(0);

    assert_eq!(read_counter(&cache, &calls).await, 0);
    clock.advance(Duration::hours(23));
    assert_eq!(read_counter(&cache, &calls).await, 0);
    assert!(cache.peek(&key("0xttl")).is_some());

    clock.advance(Duration::hours(2));
    assert!(cache.peek(&key("0xttl")).is_none());
    assert_eq!(read_counter(&cache, &calls).await, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Keys differ by chain and lookup kind, not just address
#[tokio::test]
async fn test_key_includes_chain_and_kind() {
    let cache: VerificationCache<&'static str> = VerificationCache::new(10);

    let eth = CacheKey::new(Chain::Ethereum, "0xabc", LookupKind::Bytecode);
    let base = CacheKey::new(Chain::Base, "0xabc", LookupKind::Bytecode);
    let source = CacheKey::new(Chain::Ethereum, "0xabc", LookupKind::Source);

    for (k, v) in [(eth.clone(), "eth"), (base.clone(), "base"), (source.clone(), "source")] {
        cache
            .get_or_compute(k, || async move { Ok::<_, String>(v) }, Duration::hours(1))
            .await
            .unwrap();
    }

    assert_eq!(cache.len(), 3);
    assert_eq!(cache.peek(&eth), Some("eth"));
    assert_eq!(cache.peek(&base), Some("base"));
    assert_eq!(cache.peek(&source), Some("source"));
}

async fn slow_read(cache: &VerificationCache<u32>, address: &str, calls: &AtomicUsize) -> u32 {
    cache
        .get_or_compute(
            key(address),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(StdDuration::from_secs(30)).await;
                Ok::<_, String>(42)
            },
            Duration::hours(24),
        )
        .await
        .unwrap()
}

/// Evicting a key whose computation is still running does not start a second one
#[tokio::test(start_paused = true)]
async fn test_eviction_during_computation_keeps_single_flight() {
    let cache: Arc<VerificationCache<u32>> = Arc::new(VerificationCache::new(1));
    let calls = Arc::new(AtomicUsize::new(0));

    let first = {
        let cache = cache.clone();
        let calls = calls.clone();
        tokio::spawn(async move { slow_read(&cache, "0xslow", &calls).await })
    };
    tokio::task::yield_now().await;

    // Capacity 1: this pushes the in-flight key out of the LRU
    let other = cache
        .get_or_compute(key("0xother"), || async { Ok::<_, String>(7) }, Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(other, 7);
    assert!(cache.peek(&key("0xslow")).is_none());

    let second = {
        let cache = cache.clone();
        let calls = calls.clone();
        tokio::spawn(async move { slow_read(&cache, "0xslow", &calls).await })
    };

    assert_eq!(first.await.unwrap(), 42);
    assert_eq!(second.await.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Invalidating a key mid-computation lets later readers join the running one
#[tokio::test(start_paused = true)]
async fn test_invalidate_during_computation_keeps_single_flight() {
    let cache: Arc<VerificationCache<u32>> = Arc::new(VerificationCache::new(10));
    let calls = Arc::new(AtomicUsize::new(0));

    let first = {
        let cache = cache.clone();
        let calls = calls.clone();
        tokio::spawn(async move { slow_read(&cache, "0xslow", &calls).await })
    };
    tokio::task::yield_now().await;
    cache.invalidate(&key("0xslow"));

    let second = {
        let cache = cache.clone();
        let calls = calls.clone();
        tokio::spawn(async move { slow_read(&cache, "0xslow", &calls).await })
    };

    assert_eq!(first.await.unwrap(), 42);
    assert_eq!(second.await.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Once settled, a later invalidate does force a recompute
    cache.invalidate(&key("0xslow"));
    assert_eq!(slow_read(&cache, "0xslow", &calls).await, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
