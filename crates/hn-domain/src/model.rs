//! Core data model shared by every stage of the notification pipeline:
//! transcript messages, the derived `Tool` view, and the closed `Status`
//! enumeration the state machine resolves to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One line of a transcript. `timestamp` is weakly monotonic by append
/// order within a single transcript — ties are broken by preserving the
/// original line order, never by re-sorting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    pub content: Content,
}

/// Content arrives as either a plain string or an ordered list of parts.
/// Both shapes are accepted on read; only `Parts` is ever synthesized
/// internally (e.g. when wrapping a plain string for uniform iteration).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Plain(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ToolUse {
        name: String,
        #[serde(default)]
        input: serde_json::Map<String, serde_json::Value>,
    },
}

impl Message {
    /// Text parts only, in order, ignoring any tool_use parts.
    pub fn text_parts(&self) -> Vec<&str> {
        match &self.content {
            Content::Plain(s) => vec![s.as_str()],
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ToolUse { .. } => None,
                })
                .collect(),
        }
    }

    /// All text parts concatenated with a single space.
    pub fn text(&self) -> String {
        self.text_parts().join(" ")
    }

    /// tool_use parts only, in order, paired with their ordinal position
    /// within this message (0-based).
    pub fn tool_uses(&self) -> Vec<(&str, &serde_json::Map<String, serde_json::Value>)> {
        match &self.content {
            Content::Plain(_) => Vec::new(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolUse { name, input } => Some((name.as_str(), input)),
                    ContentPart::Text { .. } => None,
                })
                .collect(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Derived view of a single `tool_use` content part. `position` is the
/// tool's ordinal among all tools in the analyzed window (flat ordering
/// across message boundaries, per the spec's resolved open question).
#[derive(Debug, Clone)]
pub struct Tool {
    pub name: String,
    pub position: usize,
    pub timestamp: DateTime<Utc>,
}

pub const ACTIVE_TOOLS: &[&str] = &["Write", "Edit", "Bash", "NotebookEdit", "SlashCommand", "KillShell"];
pub const QUESTION_TOOLS: &[&str] = &["AskUserQuestion"];
pub const PLANNING_TOOLS: &[&str] = &["ExitPlanMode", "TodoWrite"];
pub const READLIKE_TOOLS: &[&str] = &["Read", "Grep", "Glob"];

pub fn is_active(name: &str) -> bool {
    ACTIVE_TOOLS.contains(&name)
}

pub fn is_question(name: &str) -> bool {
    QUESTION_TOOLS.contains(&name)
}

pub fn is_planning(name: &str) -> bool {
    PLANNING_TOOLS.contains(&name)
}

pub fn is_readlike(name: &str) -> bool {
    READLIKE_TOOLS.contains(&name)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    TaskComplete,
    ReviewComplete,
    Question,
    PlanReady,
    SessionLimitReached,
    ApiError,
    Unknown,
}

impl Status {
    /// Stable key used in fingerprints, lock directory names, and config
    /// lookups (`statuses.<name>`).
    pub fn key(&self) -> &'static str {
        match self {
            Status::TaskComplete => "task_complete",
            Status::ReviewComplete => "review_complete",
            Status::Question => "question",
            Status::PlanReady => "plan_ready",
            Status::SessionLimitReached => "session_limit_reached",
            Status::ApiError => "api_error",
            Status::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session / notification state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Schema version stamped into persisted `SessionState` / `NotificationRecord`
/// JSON. A future incompatible change bumps this; readers that see a
/// mismatch skip the file rather than fail to parse it.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Per-session cooldown bookkeeping, persisted to `state/<session>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub session_id: String,
    pub last_task_complete_at: Option<DateTime<Utc>>,
    pub last_any_notification_at: Option<DateTime<Utc>>,
    pub last_status_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn default_schema_version() -> u32 {
    STATE_SCHEMA_VERSION
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            session_id: session_id.into(),
            last_task_complete_at: None,
            last_any_notification_at: None,
            last_status_fingerprint: None,
            created_at: now,
        }
    }
}

/// One committed notification, written at dedup commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub session_id: String,
    pub status: Status,
    pub content_fingerprint: String,
    pub sent_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Webhook request
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Slack,
    Discord,
    Telegram,
    Lark,
    Custom,
}

#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub url: String,
    pub preset: Preset,
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
    pub chat_id: Option<String>,
    pub request_id: String,
    pub attempt_number: u32,
}
