//! Per-endpoint token bucket, refilled continuously from
//! `requests_per_minute`. Same per-key registry shape as [`crate::circuit`].

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;

use hn_domain::config::RateLimitConfig;

struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(cfg: &RateLimitConfig) -> Self {
        let capacity = cfg.requests_per_minute.max(1) as f64;
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = Instant::now();
    }

    fn try_take(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub struct RateLimiterRegistry {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self { buckets: Mutex::new(HashMap::new()) }
    }

    /// Attempt to consume one token for `url`. Buckets are created lazily
    /// per endpoint and reconfigured if `cfg` changes between calls (the
    /// engine holds one config per run, so this only matters across
    /// process invocations sharing no state anyway).
    pub fn try_acquire(&self, url: &str, cfg: &RateLimitConfig) -> bool {
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(url.to_string()).or_insert_with(|| Bucket::new(cfg));
        bucket.try_take()
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_burst_up_to_capacity_then_blocks() {
        let reg = RateLimiterRegistry::new();
        let cfg = RateLimitConfig { requests_per_minute: 3 };
        assert!(reg.try_acquire("u", &cfg));
        assert!(reg.try_acquire("u", &cfg));
        assert!(reg.try_acquire("u", &cfg));
        assert!(!reg.try_acquire("u", &cfg));
    }

    #[test]
    fn refills_over_time() {
        let reg = RateLimiterRegistry::new();
        let cfg = RateLimitConfig { requests_per_minute: 60 };
        for _ in 0..60 {
            assert!(reg.try_acquire("u", &cfg));
        }
        assert!(!reg.try_acquire("u", &cfg));
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(reg.try_acquire("u", &cfg));
    }

    #[test]
    fn distinct_endpoints_have_independent_buckets() {
        let reg = RateLimiterRegistry::new();
        let cfg = RateLimitConfig { requests_per_minute: 1 };
        assert!(reg.try_acquire("a", &cfg));
        assert!(!reg.try_acquire("a", &cfg));
        assert!(reg.try_acquire("b", &cfg));
    }
}
