//! Verification cache with TTL and single-flight computation
//!
//! Memoizes expensive lookups (contract verification, creator history).
//! - Key: `(chain, address, lookup kind)`
//! - Expired entries are evicted lazily on access
//! - Concurrent misses on one key share a single in-flight computation
//! - A failed computation leaves nothing behind; the next caller retries
//!
//! Each key owns a slot guarded by an async mutex. The first caller to find
//! the slot empty computes while holding the lock, so later callers park on
//! the lock and then read the value it wrote. Slots with a computation in
//! progress are also tracked outside the LRU, so eviction or invalidation
//! while computing never starts a second computation for the same key.

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::metrics::MetricsState;
use crate::models::Chain;

/// Which expensive lookup a cache entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Bytecode,
    Source,
    Owner,
    Creator,
    CreatorHistory,
    TransferEvents,
    LiquidityPool,
    SocialMetadata,
    Discovery,
}

impl LookupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupKind::Bytecode => "bytecode",
            LookupKind::Source => "source",
            LookupKind::Owner => "owner",
            LookupKind::Creator => "creator",
            LookupKind::CreatorHistory => "creator_history",
            LookupKind::TransferEvents => "transfer_events",
            LookupKind::LiquidityPool => "liquidity_pool",
            LookupKind::SocialMetadata => "social_metadata",
            LookupKind::Discovery => "discovery",
        }
    }
}

/// Cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub chain: Chain,
    pub address: String,
    pub kind: LookupKind,
}

impl CacheKey {
    pub fn new(chain: Chain, address: impl Into<String>, kind: LookupKind) -> Self {
        Self {
            chain,
            address: address.into(),
            kind,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.chain, self.address, self.kind.as_str())
    }
}

/// Time source, swappable in tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Cache entry with timestamp for TTL checking
#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    computed_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.computed_at + self.ttl
    }
}

type Slot<V> = Arc<tokio::sync::Mutex<Option<CacheEntry<V>>>>;
type SlotRef<V> = Weak<tokio::sync::Mutex<Option<CacheEntry<V>>>>;

/// Time-bounded, single-flight memoization of expensive lookups
pub struct VerificationCache<V> {
    slots: Mutex<LruCache<CacheKey, Slot<V>>>,
    /// Slots whose computation has not settled yet. Lock order: `slots` first.
    in_flight: Mutex<HashMap<CacheKey, SlotRef<V>>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    metrics: Option<Arc<MetricsState>>,
}

impl<V: Clone + Send> VerificationCache<V> {
    /// Create a new cache holding at most `capacity` keys
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Mutex::new(LruCache::new(cap)),
            in_flight: Mutex::new(HashMap::new()),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsState>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn slot(&self, key: &CacheKey) -> Slot<V> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            return slot.clone();
        }

        let mut in_flight = self.in_flight.lock();
        let slot = match in_flight.get(key).and_then(Weak::upgrade) {
            Some(pending) => {
                tracing::trace!(key = %key, "Rejoining in-flight computation");
                pending
            }
            None => {
                let fresh: Slot<V> = Arc::new(tokio::sync::Mutex::new(None));
                in_flight.insert(key.clone(), Arc::downgrade(&fresh));
                fresh
            }
        };
        slots.put(key.clone(), slot.clone());
        slot
    }

    /// Stop tracking `slot` as in flight once its computation has settled
    fn settle(&self, key: &CacheKey, slot: &Slot<V>) {
        let mut in_flight = self.in_flight.lock();
        let stale = in_flight
            .get(key)
            .is_some_and(|pending| pending.as_ptr() == Arc::as_ptr(slot) || pending.strong_count() == 0);
        if stale {
            in_flight.remove(key);
        }
    }

    /// Return the cached value for `key`, or run `compute` and cache its
    /// result for `ttl`. Errors are returned to the caller uncached.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: CacheKey,
        compute: F,
        ttl: Duration,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(&key);
        let mut entry = slot.lock().await;

        let now = self.clock.now();
        match entry.as_ref() {
            Some(cached) if cached.is_fresh(now) => {
                self.record_hit();
                tracing::trace!(key = %key, "Cache hit");
                return Ok(cached.value.clone());
            }
            Some(_) => {
                tracing::trace!(key = %key, "Cache entry expired");
                *entry = None;
            }
            None => {}
        }

        self.record_miss();
        tracing::trace!(key = %key, "Cache miss, computing");

        {
            let mut in_flight = self.in_flight.lock();
            in_flight.insert(key.clone(), Arc::downgrade(&slot));
        }
        let computed = compute().await;
        if let Ok(value) = &computed {
            *entry = Some(CacheEntry {
                value: value.clone(),
                computed_at: self.clock.now(),
                ttl,
            });
        }
        drop(entry);
        self.settle(&key, &slot);
        computed
    }

    /// Fresh cached value without computing
    pub fn peek(&self, key: &CacheKey) -> Option<V> {
        let slot = self.slots.lock().peek(key).cloned()?;
        let entry = slot.try_lock().ok()?;
        entry
            .as_ref()
            .filter(|e| e.is_fresh(self.clock.now()))
            .map(|e| e.value.clone())
    }

    /// Remove an entry from the cache
    pub fn invalidate(&self, key: &CacheKey) {
        self.slots.lock().pop(key);
        tracing::trace!(key = %key, "Cache invalidate");
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        self.slots.lock().clear();
        tracing::debug!("Cache cleared");
    }

    /// Number of keys held, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let slots = self.slots.lock();
        CacheStats {
            entries: slots.len(),
            capacity: slots.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        if let Some(m) = &self.metrics {
            m.cache_hits.inc();
        }
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        if let Some(m) = &self.metrics {
            m.cache_misses.inc();
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}
