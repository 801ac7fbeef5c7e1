//! Per-endpoint circuit breaker: `closed → open → half_open` per spec §4.8.
//! One [`CircuitRegistry`] is shared across every send through the engine;
//! state is keyed by endpoint URL so one flaky webhook doesn't trip the
//! breaker for another.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use hn_domain::config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Endpoint {
    state: State,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

impl Endpoint {
    fn new() -> Self {
        Self { state: State::Closed, consecutive_failures: 0, consecutive_successes: 0, opened_at: None }
    }
}

pub struct CircuitRegistry {
    endpoints: Mutex<HashMap<String, Endpoint>>,
}

impl CircuitRegistry {
    pub fn new() -> Self {
        Self { endpoints: Mutex::new(HashMap::new()) }
    }

    /// Whether a send to `url` may proceed right now. An `Open` breaker past
    /// its timeout transitions to `HalfOpen` and allows exactly this one
    /// probe through.
    pub fn allow(&self, url: &str, cfg: &CircuitBreakerConfig) -> bool {
        let mut endpoints = self.endpoints.lock();
        let ep = endpoints.entry(url.to_string()).or_insert_with(Endpoint::new);
        match ep.state {
            State::Closed | State::HalfOpen => true,
            State::Open => {
                let timeout = Duration::from_millis(cfg.open_timeout_ms);
                if ep.opened_at.map(|t| t.elapsed() >= timeout).unwrap_or(true) {
                    ep.state = State::HalfOpen;
                    ep.consecutive_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self, url: &str, cfg: &CircuitBreakerConfig) {
        let mut endpoints = self.endpoints.lock();
        let ep = endpoints.entry(url.to_string()).or_insert_with(Endpoint::new);
        ep.consecutive_failures = 0;
        match ep.state {
            State::Closed => {}
            State::HalfOpen => {
                ep.consecutive_successes += 1;
                if ep.consecutive_successes >= cfg.success_threshold {
                    ep.state = State::Closed;
                    ep.consecutive_successes = 0;
                }
            }
            State::Open => {}
        }
    }

    pub fn record_failure(&self, url: &str, cfg: &CircuitBreakerConfig) {
        let mut endpoints = self.endpoints.lock();
        let ep = endpoints.entry(url.to_string()).or_insert_with(Endpoint::new);
        ep.consecutive_successes = 0;
        match ep.state {
            State::Closed => {
                ep.consecutive_failures += 1;
                if ep.consecutive_failures >= cfg.failure_threshold {
                    ep.state = State::Open;
                    ep.opened_at = Some(Instant::now());
                }
            }
            State::HalfOpen => {
                ep.state = State::Open;
                ep.opened_at = Some(Instant::now());
                ep.consecutive_failures = 0;
            }
            State::Open => {}
        }
    }
}

impl Default for CircuitRegistry {
    fn default() -> Self {
        Self::new()
    }
}
