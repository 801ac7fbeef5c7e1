//! Webhook delivery engine: rate limiting, a circuit breaker, and retry with
//! jittered backoff wrapped around an HTTP POST, plus bounded graceful
//! shutdown that drains in-flight sends rather than aborting them.
//!
//! Grounded in the gateway's `SessionLockMap` for the per-endpoint registry
//! shape (`circuit`, `ratelimit`) and the node client's reconnect policy for
//! the backoff curve (`backoff`).

mod backoff;
mod circuit;
mod metrics;
mod presets;
mod ratelimit;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hn_domain::config::WebhookConfig;
use hn_domain::error::{Error, Result};
use hn_domain::model::{Preset, Status, WebhookRequest};

pub use backoff::{is_retryable_status, RetryPolicy};
pub use circuit::CircuitRegistry;
pub use metrics::{MetricsSnapshot, WebhookMetrics};
pub use presets::{build_payload, PayloadInput};
pub use ratelimit::RateLimiterRegistry;

/// Builds the request body for `preset`, exposed so callers (`hn-notify`)
/// can construct a [`WebhookRequest`] without reaching into this crate's
/// private modules.
pub fn payload_for(preset: Preset, input: &PayloadInput<'_>) -> serde_json::Value {
    build_payload(preset, input)
}

pub struct WebhookEngine {
    client: reqwest::Client,
    circuit: CircuitRegistry,
    rate_limit: RateLimiterRegistry,
    metrics: WebhookMetrics,
    shutdown_requested: AtomicBool,
    shutdown_signal: Arc<tokio::sync::Notify>,
    inflight: Arc<AtomicU64>,
    drained_signal: Arc<tokio::sync::Notify>,
}

impl WebhookEngine {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::WebhookTransport(e.to_string()))?;
        Ok(Self {
            client,
            circuit: CircuitRegistry::new(),
            rate_limit: RateLimiterRegistry::new(),
            metrics: WebhookMetrics::new(),
            shutdown_requested: AtomicBool::new(false),
            shutdown_signal: Arc::new(tokio::sync::Notify::new()),
            inflight: Arc::new(AtomicU64::new(0)),
            drained_signal: Arc::new(tokio::sync::Notify::new()),
        })
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Send `request` through rate limiting and the circuit breaker, with
    /// retry-on-transient-failure up to `cfg.retry.max_attempts`. Returns
    /// `Ok(())` once any attempt succeeds (2xx response); returns the last
    /// error once attempts are exhausted or the breaker is open.
    pub async fn send_with_retry(&self, mut request: WebhookRequest, cfg: &WebhookConfig) -> Result<()> {
        let policy = RetryPolicy::from_config(&cfg.retry);
        self.metrics.record_attempt();
        let mut attempt = 1;
        loop {
            if self.shutdown_requested.load(Ordering::SeqCst) {
                return Err(Error::Other("webhook engine is shutting down".into()));
            }
            request.attempt_number = attempt;
            match self.send_once(&request, cfg).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let retryable = matches!(&e, Error::WebhookTransport(_))
                        || matches!(&e, Error::WebhookHttpStatus(s) if is_retryable_status(*s));
                    if !retryable || !policy.should_attempt(attempt + 1) {
                        return Err(e);
                    }
                    self.metrics.record_retry();
                    attempt += 1;
                    if !self.sleep_cancellable(policy.delay_for_attempt(attempt)).await {
                        return Err(Error::Other("webhook engine is shutting down".into()));
                    }
                }
            }
        }
    }

    /// Single-attempt send, no retry loop. Exposed for callers (tests, or a
    /// future fire-and-forget path) that want full control over retries.
    pub async fn send(&self, request: &WebhookRequest, cfg: &WebhookConfig) -> Result<()> {
        self.send_once(request, cfg).await
    }

    async fn send_once(&self, request: &WebhookRequest, cfg: &WebhookConfig) -> Result<()> {
        if !self.circuit.allow(&request.url, &cfg.circuit_breaker) {
            self.metrics.record_circuit_rejected();
            return Err(Error::CircuitOpen(request.url.clone()));
        }
        if !self.rate_limit.try_acquire(&request.url, &cfg.rate_limit) {
            self.metrics.record_rate_limited();
            return Err(Error::RateLimitExceeded(request.url.clone()));
        }

        let _guard = InflightGuard::enter(&self.inflight, &self.drained_signal);
        let started = Instant::now();

        let mut builder = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let outcome = builder.send().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(resp) if resp.status().is_success() => {
                self.metrics.record_sent(latency_ms);
                self.circuit.record_success(&request.url, &cfg.circuit_breaker);
                Ok(())
            }
            Ok(resp) => {
                let status = resp.status().as_u16();
                self.metrics.record_failure();
                self.circuit.record_failure(&request.url, &cfg.circuit_breaker);
                Err(Error::WebhookHttpStatus(status))
            }
            Err(e) => {
                self.metrics.record_failure();
                self.circuit.record_failure(&request.url, &cfg.circuit_breaker);
                Err(Error::WebhookTransport(e.to_string()))
            }
        }
    }

    /// Sleep for `dur`, returning early with `false` if shutdown is
    /// requested mid-sleep. Arms the notified future before checking the
    /// flag so a `notify_waiters` that fires between the check and the
    /// `select!` can't be missed.
    async fn sleep_cancellable(&self, dur: Duration) -> bool {
        let notified = self.shutdown_signal.notified();
        if self.shutdown_requested.load(Ordering::SeqCst) {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(dur) => true,
            _ = notified => false,
        }
    }

    /// Stop accepting new retry delays and wait up to `timeout` for
    /// in-flight sends to finish. Does not cancel a send already underway;
    /// it only short-circuits queued backoff sleeps and future attempts.
    pub async fn shutdown(&self, timeout: Duration) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.shutdown_signal.notify_waiters();

        let deadline = Instant::now() + timeout;
        loop {
            // Arm the notification before checking the counter: if a send
            // finishes and calls notify_waiters() between the check and the
            // await below, the wakeup would otherwise be lost.
            let drained = self.drained_signal.notified();
            if self.inflight.load(Ordering::SeqCst) == 0 {
                return;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!("webhook engine shutdown timed out with sends still in flight");
                return;
            }
            tokio::select! {
                _ = drained => {}
                _ = tokio::time::sleep(remaining) => {}
            }
        }
    }
}

impl Default for WebhookEngine {
    fn default() -> Self {
        Self::new().expect("reqwest client builds with default settings")
    }
}

struct InflightGuard {
    count: Arc<AtomicU64>,
    drained_signal: Arc<tokio::sync::Notify>,
}

impl InflightGuard {
    fn enter(count: &Arc<AtomicU64>, drained_signal: &Arc<tokio::sync::Notify>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self { count: count.clone(), drained_signal: drained_signal.clone() }
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained_signal.notify_waiters();
        }
    }
}

/// Build a [`WebhookRequest`] from the notification fields and webhook
/// config. Returns `None` when no URL is configured (webhook disabled or
/// misconfigured) rather than an error — callers treat a missing webhook
/// the same as one that's turned off.
pub fn build_request(cfg: &WebhookConfig, status: Status, title: &str, message: &str, session_id: &str, timestamp: chrono::DateTime<chrono::Utc>) -> Option<WebhookRequest> {
    let url = cfg.url.clone()?;
    let preset = cfg.preset.unwrap_or(Preset::Custom);
    let input = PayloadInput { status, title, message, session_id, timestamp, chat_id: cfg.chat_id.as_deref() };
    let body = build_payload(preset, &input);

    // User-Agent and X-Request-ID are always sent; Content-Type is set by
    // reqwest's `.json()` call in the engine, not threaded through here.
    // The request id is generated once and reused across every retry of
    // this logical send.
    let mut headers = cfg.headers.clone();
    headers.insert("User-Agent".into(), format!("hook-notify/{}", env!("CARGO_PKG_VERSION")));
    let request_id = uuid::Uuid::new_v4().to_string();
    headers.insert("X-Request-ID".into(), request_id.clone());

    Some(WebhookRequest {
        url,
        preset,
        headers,
        body,
        chat_id: cfg.chat_id.clone(),
        request_id,
        attempt_number: 1,
    })
}
