//! Per-preset payload shaping. Every preset carries the same base fields
//! (`status`, `title`, `message`, `session_id`, `timestamp`) and layers its
//! own provider-specific envelope on top, per spec §4.8.

use chrono::{DateTime, Utc};
use hn_domain::model::{Preset, Status};
use serde_json::{json, Value};

/// Status → color used by every chat-card preset. Green for the two
/// "good news" completions, blue for a plan awaiting approval, orange for
/// a blocking question, red for the two failure states.
fn status_color_hex(status: Status) -> &'static str {
    match status {
        Status::TaskComplete | Status::ReviewComplete => "#2eb67d",
        Status::PlanReady => "#36a3eb",
        Status::Question => "#f2a922",
        Status::SessionLimitReached | Status::ApiError => "#e01e5a",
        Status::Unknown => "#9e9e9e",
    }
}

/// Same palette, encoded as the decimal integer Discord embeds expect.
fn status_color_int(status: Status) -> u32 {
    u32::from_str_radix(status_color_hex(status).trim_start_matches('#'), 16).unwrap_or(0x9e9e9e)
}

fn base_fields(status: Status, title: &str, message: &str, session_id: &str, timestamp: DateTime<Utc>) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    map.insert("status".into(), json!(status.key()));
    map.insert("title".into(), json!(title));
    map.insert("message".into(), json!(message));
    map.insert("session_id".into(), json!(session_id));
    map.insert("timestamp".into(), json!(timestamp.to_rfc3339()));
    map
}

pub struct PayloadInput<'a> {
    pub status: Status,
    pub title: &'a str,
    pub message: &'a str,
    pub session_id: &'a str,
    pub timestamp: DateTime<Utc>,
    pub chat_id: Option<&'a str>,
}

/// Build the request body for `preset` from the common notification fields.
pub fn build_payload(preset: Preset, input: &PayloadInput<'_>) -> Value {
    let mut base = base_fields(input.status, input.title, input.message, input.session_id, input.timestamp);
    match preset {
        Preset::Slack => {
            base.insert(
                "attachments".into(),
                json!([{
                    "color": status_color_hex(input.status),
                    "title": input.title,
                    "text": input.message,
                }]),
            );
        }
        Preset::Discord => {
            base.insert(
                "embeds".into(),
                json!([{
                    "title": input.title,
                    "description": input.message,
                    "color": status_color_int(input.status),
                }]),
            );
        }
        Preset::Telegram => {
            base.insert("chat_id".into(), json!(input.chat_id.unwrap_or_default()));
            base.insert("text".into(), json!(format!("<b>{}</b>\n{}", escape_html(input.title), escape_html(input.message))));
            base.insert("parse_mode".into(), json!("HTML"));
        }
        Preset::Lark => {
            base.insert(
                "card".into(),
                json!({
                    "config": { "wide_screen_mode": true },
                    "header": {
                        "title": { "tag": "plain_text", "content": input.title },
                        "template": lark_header_template(input.status),
                    },
                    "elements": [
                        { "tag": "div", "text": { "tag": "lark_md", "content": input.message } }
                    ],
                }),
            );
        }
        Preset::Custom => {
            // base fields only — the generic JSON envelope.
        }
    }
    Value::Object(base)
}

/// Lark headers use named template colors rather than hex/int.
fn lark_header_template(status: Status) -> &'static str {
    match status {
        Status::TaskComplete | Status::ReviewComplete => "green",
        Status::PlanReady => "blue",
        Status::Question => "orange",
        Status::SessionLimitReached | Status::ApiError => "red",
        Status::Unknown => "grey",
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
