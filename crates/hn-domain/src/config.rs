//! Configuration tree loaded from `<plugin_root>/config/config.json`.
//!
//! Every field has a default so a missing or partial config file degrades
//! gracefully (§7: `ConfigInvalid` is surfaced only at configure-time
//! commands; at hook time we fall back to defaults and log a warning).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::Preset;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Per-status display overrides, keyed by `Status::key()`.
    #[serde(default)]
    pub statuses: HashMap<String, StatusDisplayConfig>,
}

impl Config {
    /// Parse from a JSON string, never failing: on error, log via the
    /// caller and fall back to `Config::default()`. Parsing itself is kept
    /// fallible so callers can decide whether to warn.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Title configured for a status, falling back to a generic title
    /// derived from the status key.
    pub fn status_title(&self, status: &crate::model::Status) -> String {
        self.statuses
            .get(status.key())
            .map(|s| s.title.clone())
            .unwrap_or_else(|| default_title(status))
    }
}

fn default_title(status: &crate::model::Status) -> String {
    use crate::model::Status::*;
    match status {
        TaskComplete => "Task Complete".into(),
        ReviewComplete => "Review Complete".into(),
        Question => "Question".into(),
        PlanReady => "Plan Ready".into(),
        SessionLimitReached => "Session Limit Reached".into(),
        ApiError => "API Error".into(),
        Unknown => "Notification".into(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDisplayConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default = "d_true")]
    pub sound: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// notifications.*
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsConfig {
    #[serde(default)]
    pub desktop: DesktopConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default = "d_suppress_seconds")]
    pub suppress_question_after_task_complete_seconds: u64,
    #[serde(default = "d_suppress_seconds")]
    pub suppress_question_after_any_notification_seconds: u64,
    #[serde(default)]
    pub notify_on_subagent_stop: bool,
    #[serde(default = "d_true")]
    pub notify_on_text_response: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            desktop: DesktopConfig::default(),
            webhook: WebhookConfig::default(),
            suppress_question_after_task_complete_seconds: d_suppress_seconds(),
            suppress_question_after_any_notification_seconds: d_suppress_seconds(),
            notify_on_subagent_stop: false,
            notify_on_text_response: true,
        }
    }
}

fn d_suppress_seconds() -> u64 {
    12
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DesktopMethod {
    Auto,
    Osc9,
    TerminalNotifier,
    Beeep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_true")]
    pub sound: bool,
    #[serde(default = "d_volume")]
    pub volume: f32,
    #[serde(default)]
    pub audio_device: String,
    #[serde(default)]
    pub app_icon: String,
    #[serde(default = "d_true")]
    pub click_to_focus: bool,
    #[serde(default)]
    pub terminal_bundle_id: String,
    #[serde(default)]
    pub method: DesktopMethod,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: true,
            volume: d_volume(),
            audio_device: String::new(),
            app_icon: String::new(),
            click_to_focus: true,
            terminal_bundle_id: String::new(),
            method: DesktopMethod::Auto,
        }
    }
}

impl Default for DesktopMethod {
    fn default() -> Self {
        DesktopMethod::Auto
    }
}

fn d_volume() -> f32 {
    1.0
}

fn d_true() -> bool {
    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// notifications.webhook.*
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub preset: Option<Preset>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default = "d_format")]
    pub format: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            preset: None,
            url: None,
            chat_id: None,
            format: d_format(),
            headers: HashMap::new(),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

fn d_format() -> String {
    "json".into()
}

impl WebhookConfig {
    /// Validate fields that only matter once the webhook channel is
    /// enabled (per preset requirements in spec §4.8 — telegram needs a
    /// `chat_id`). Called at configure-time, never at hook time.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.enabled {
            return issues;
        }
        if self.url.is_none() {
            issues.push("webhook.enabled is true but webhook.url is unset".into());
        }
        if matches!(self.preset, Some(Preset::Telegram)) && self.chat_id.is_none() {
            issues.push("webhook.preset is telegram but webhook.chat_id is unset".into());
        }
        issues
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "d_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "d_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "d_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: d_initial_backoff_ms(),
            max_backoff_ms: d_max_backoff_ms(),
            max_attempts: d_max_attempts(),
        }
    }
}

fn d_initial_backoff_ms() -> u64 {
    1_000
}
fn d_max_backoff_ms() -> u64 {
    10_000
}
fn d_max_attempts() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerConfig {
    #[serde(default = "d_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "d_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "d_open_timeout_ms")]
    pub open_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: d_failure_threshold(),
            success_threshold: d_success_threshold(),
            open_timeout_ms: d_open_timeout_ms(),
        }
    }
}

fn d_failure_threshold() -> u32 {
    5
}
fn d_success_threshold() -> u32 {
    2
}
fn d_open_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    #[serde(default = "d_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: d_requests_per_minute(),
        }
    }
}

fn d_requests_per_minute() -> u32 {
    60
}
