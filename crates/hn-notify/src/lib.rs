//! Notifier facade: the two operations the hook router calls after
//! classification, dedup, and summary generation have produced a status and
//! a message — `send_desktop` (synchronous, best-effort) and `send_webhook`
//! (delegates to [`hn_webhook::WebhookEngine`]).

mod backend;

use std::sync::{mpsc, Arc};
use std::time::Duration;

use chrono::Utc;
use hn_domain::config::{Config, WebhookConfig};
use hn_domain::error::{Error, Result};
use hn_domain::model::Status;
use hn_webhook::WebhookEngine;

pub use backend::{default_backend, DesktopBackend, LogBackend, OsaScriptBackend};

/// Desktop sends that hang (a stuck `osascript` process waiting on a
/// permission dialog, say) are bounded by this hard upper limit per spec
/// §5's cancellation model.
const DESKTOP_SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub struct NotifierFacade {
    backend: Arc<dyn DesktopBackend>,
    webhook: WebhookEngine,
}

impl NotifierFacade {
    pub fn new() -> Result<Self> {
        Ok(Self { backend: Arc::from(default_backend()), webhook: WebhookEngine::new()? })
    }

    pub fn with_backend(backend: Box<dyn DesktopBackend>) -> Result<Self> {
        Ok(Self { backend: Arc::from(backend), webhook: WebhookEngine::new()? })
    }

    /// Render a title from `cfg`'s per-status display config and an
    /// optional `[name|branch]` bracket prefix on `message`, then dispatch
    /// through the configured backend with a hard timeout. Failures are
    /// logged, never propagated — the router's desktop leg is best-effort.
    pub fn send_desktop(&self, cfg: &Config, status: Status, message: &str) -> Result<()> {
        if !cfg.notifications.desktop.enabled {
            return Ok(());
        }
        let (prefix, body) = split_bracket_prefix(message);
        let title = render_title(cfg, status, prefix);
        let body = body.to_string();
        let backend = self.backend.clone();

        match run_with_timeout(DESKTOP_SEND_TIMEOUT, move || backend.send(&title, &body)) {
            Ok(result) => {
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "desktop notification failed");
                }
                result
            }
            Err(timeout_err) => {
                tracing::warn!(error = %timeout_err, "desktop notification timed out");
                Err(timeout_err)
            }
        }
    }

    /// Build a webhook request from `status`/`message` and submit it
    /// through the resilience stack. A disabled or unconfigured webhook
    /// channel is a silent no-op, matching `send_desktop`'s posture.
    pub async fn send_webhook(&self, cfg: &WebhookConfig, status: Status, title: &str, message: &str, session_id: &str) -> Result<()> {
        if !cfg.enabled {
            return Ok(());
        }
        let Some(request) = hn_webhook::build_request(cfg, status, title, message, session_id, Utc::now()) else {
            tracing::warn!("webhook enabled but no url configured; skipping send");
            return Ok(());
        };
        self.webhook.send_with_retry(request, cfg).await
    }

    pub fn webhook_metrics(&self) -> hn_webhook::MetricsSnapshot {
        self.webhook.get_metrics()
    }

    /// Drain in-flight webhook sends with a bounded wait before the hook
    /// process exits. Desktop sends are already synchronous by the time
    /// this is called.
    pub async fn shutdown(&self, timeout: Duration) {
        self.webhook.shutdown(timeout).await;
    }
}

/// Runs `f` on a worker thread and waits up to `timeout`. A timed-out send
/// leaves the worker thread running to completion in the background (it
/// may eventually succeed or fail, unobserved) but the caller is freed
/// immediately — matching spec §5's "hard upper-bound timeout" guarantee
/// without needing to kill an in-flight `osascript` process.
fn run_with_timeout(timeout: Duration, f: impl FnOnce() -> Result<()> + Send + 'static) -> Result<Result<()>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => Ok(result),
        Err(_) => Err(Error::Timeout(timeout)),
    }
}

/// Extracts an optional `(name, branch)` pair from a leading
/// `"[name|branch] "` or `"[name] "` prefix, returning the remainder as the
/// notification body.
fn split_bracket_prefix(message: &str) -> (Option<(&str, &str)>, &str) {
    let Some(rest) = message.strip_prefix('[') else {
        return (None, message);
    };
    let Some(end) = rest.find(']') else {
        return (None, message);
    };
    let inner = &rest[..end];
    let body = rest[end + 1..].trim_start();
    match inner.split_once('|') {
        Some((name, branch)) => (Some((name, branch)), body),
        None => (Some((inner, "")), body),
    }
}

fn render_title(cfg: &Config, status: Status, prefix: Option<(&str, &str)>) -> String {
    let base = cfg.status_title(&status);
    match prefix {
        Some((name, branch)) if !name.is_empty() && !branch.is_empty() => format!("{base} — {name} ({branch})"),
        Some((name, _)) if !name.is_empty() => format!("{base} — {name}"),
        _ => base,
    }
}
