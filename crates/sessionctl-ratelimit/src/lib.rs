//! Token-bucket rate limiter and its idle-bucket sweep.
//!
//! DashMap-backed per-key buckets with a periodic sweep task: capacity
//! equals the per-key rate (one second of budget), no jitter, and a
//! decision never blocks. It refuses instead of waiting.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);
const IDLE_EVICTION: Duration = Duration::from_secs(3600);

/// A keyed set of token buckets. One instance is used for
/// principal-keyed limiting (rate from the principal), a second for
/// remote-address-keyed limiting (a fixed rate applied before
/// authentication).
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
}

impl RateLimiter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { buckets: DashMap::new() })
    }

    /// `allow(key, rate)`: lazily create a bucket with
    /// `tokens = rate`; refill by `elapsed * rate` clamped to `rate`; admit
    /// if at least one token is available.
    pub fn allow(&self, key: &str, rate: f64) -> bool {
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket { tokens: rate, last_refill: now });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * rate).min(rate);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets idle for more than an hour. Called by the spawned
    /// sweep task; exposed directly so tests don't need to wait on a real
    /// timer.
    pub fn sweep(&self) {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) < IDLE_EVICTION);
        let after = self.buckets.len();
        if before != after {
            tracing::debug!(removed = before - after, remaining = after, "rate limiter bucket sweep");
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

/// Spawn the periodic sweep (5-minute period, one-hour idle eviction) for
/// one or more limiters. Returns the join handle so callers can abort it
/// on shutdown.
pub fn spawn_sweep(limiters: Vec<Arc<RateLimiter>>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            for limiter in &limiters {
                limiter.sweep();
            }
        }
    })
}
