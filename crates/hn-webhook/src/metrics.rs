//! Lightweight in-process counters surfaced via `WebhookEngine::get_metrics`.
//! No external metrics crate is pulled in for this — the teacher's own
//! gateway keeps ad hoc atomic counters for exactly this kind of
//! process-lifetime tally rather than wiring up a registry for a handful of
//! numbers, so this follows suit.

use std::sync::atomic::{AtomicU64, Ordering};

/// Smoothing factor for the latency EMA. Low enough that one slow outlier
/// doesn't dominate the snapshot, high enough to track a sustained shift
/// within a handful of sends.
const EMA_ALPHA: f64 = 0.2;

#[derive(Debug, Default)]
pub struct WebhookMetrics {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    rate_limited: AtomicU64,
    circuit_open: AtomicU64,
    /// `f64` bits of the current EMA, 0 meaning "no sample yet" (handled via
    /// `has_sample`) since 0.0 is itself a valid latency.
    ema_latency_ms_bits: AtomicU64,
    has_sample: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub retried: u64,
    pub rate_limited: u64,
    pub circuit_open: u64,
    pub avg_latency_ms: f64,
}

impl WebhookMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one logical send (a `send_with_retry` call), not each HTTP
    /// attempt within it — a 3-attempt retry-then-succeed sequence reports
    /// `total=1 successful=1`, not `total=3`.
    pub fn record_attempt(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self, latency_ms: u64) {
        self.successful.fetch_add(1, Ordering::Relaxed);
        self.update_ema(latency_ms as f64);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_circuit_rejected(&self) {
        self.circuit_open.fetch_add(1, Ordering::Relaxed);
    }

    /// CAS loop over the bit-packed `f64`: the first sample seeds the EMA
    /// directly, every later sample blends in at `EMA_ALPHA`.
    fn update_ema(&self, sample_ms: f64) {
        loop {
            let had_sample = self.has_sample.load(Ordering::Acquire) != 0;
            let current_bits = self.ema_latency_ms_bits.load(Ordering::Acquire);
            let next = if had_sample {
                let current = f64::from_bits(current_bits);
                current + EMA_ALPHA * (sample_ms - current)
            } else {
                sample_ms
            };
            if self
                .ema_latency_ms_bits
                .compare_exchange(current_bits, next.to_bits(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.has_sample.store(1, Ordering::Release);
                return;
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let avg_latency_ms = if self.has_sample.load(Ordering::Acquire) != 0 {
            f64::from_bits(self.ema_latency_ms_bits.load(Ordering::Acquire))
        } else {
            0.0
        };
        MetricsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            circuit_open: self.circuit_open.load(Ordering::Relaxed),
            avg_latency_ms,
        }
    }
}
