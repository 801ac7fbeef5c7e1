//! Jittered exponential backoff for retrying a failed webhook send, adapted
//! from the node client's reconnect policy to the retry shape spec §4.8
//! describes (attempt-bounded instead of unbounded).

use std::time::Duration;

use hn_domain::config::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(cfg.initial_backoff_ms),
            max_delay: Duration::from_millis(cfg.max_backoff_ms),
            max_attempts: cfg.max_attempts,
        }
    }

    /// Delay before retry attempt `attempt` (1-indexed: the delay before the
    /// second overall send).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * 2f64.powi(attempt.saturating_sub(1) as i32);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        let jitter = capped_ms * 0.25 * pseudo_random_fraction(attempt);
        Duration::from_millis((capped_ms + jitter) as u64)
    }

    /// Whether `attempt` (the attempt about to be made, 1-indexed) is still
    /// within `max_attempts`.
    pub fn should_attempt(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts.max(1)
    }
}

fn pseudo_random_fraction(attempt: u32) -> f64 {
    let hash = attempt.wrapping_mul(2654435761);
    (hash as f64) / (u32::MAX as f64)
}

/// Whether an HTTP status should be retried. Only 5xx is transient; every
/// 4xx (including 429) is terminal per spec — "do not retry 4xx".
pub fn is_retryable_status(status: u16) -> bool {
    (500..600).contains(&status)
}
