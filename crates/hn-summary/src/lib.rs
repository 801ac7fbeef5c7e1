//! Renders the single-sentence notification body for a resolved [`Status`],
//! from the same transcript the state machine classified. Every per-status
//! builder funnels its result through [`markdown::clean_markdown`] and a
//! final [`sentence::truncate`] to the 150-codepoint limit — the two shared
//! helpers the spec calls out explicitly.

pub mod markdown;
pub mod sentence;

use chrono::{DateTime, Utc};
use hn_domain::model::{Message, Role, Status};
use markdown::{clean_markdown, collapse_whitespace, strip_inline, strip_line_prefix};
use sentence::{first_sentence, split_sentences, truncate};

const MAX_LEN: usize = 150;
const QUESTION_WINDOW: usize = 8;
const REVIEW_WINDOW: usize = 5;
const QUESTION_TOOL_FRESHNESS_SECS: i64 = 60;

const REVIEW_KEYWORDS: &[&str] = &["review", "reviewed", "analysis", "analyzed"];

const DEFAULT_QUESTION: &str = "Claude needs your input to continue";
const DEFAULT_PLAN_READY: &str = "Plan ready for review.";
const DEFAULT_REVIEW_COMPLETE: &str = "Code review completed.";
const DEFAULT_TASK_COMPLETE: &str = "Task completed successfully.";
const SESSION_LIMIT_MESSAGE: &str = "Session limit reached. Please start a new conversation.";
const API_ERROR_MESSAGE: &str = "Please run /login";

/// Build the notification body for `status` from the full transcript.
pub fn summarize(status: Status, msgs: &[Message]) -> String {
    let raw = match status {
        Status::Question => question_summary(msgs),
        Status::PlanReady => plan_ready_summary(msgs),
        Status::ReviewComplete => review_complete_summary(msgs),
        Status::TaskComplete => task_complete_summary(msgs),
        Status::SessionLimitReached => SESSION_LIMIT_MESSAGE.to_string(),
        Status::ApiError => API_ERROR_MESSAGE.to_string(),
        Status::Unknown => String::new(),
    };
    finalize(&raw)
}

fn finalize(raw: &str) -> String {
    truncate(&clean_markdown(raw), MAX_LEN)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// shared transcript helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn last_assistant(msgs: &[Message]) -> Option<&Message> {
    msgs.iter().rev().find(|m| matches!(m.role, Role::Assistant))
}

fn last_assistant_timestamp(msgs: &[Message]) -> Option<DateTime<Utc>> {
    last_assistant(msgs).map(|m| m.timestamp)
}

/// The most recent tool_use named `name` across the whole transcript,
/// paired with the timestamp of the message it appeared in.
fn most_recent_tool_input<'a>(
    msgs: &'a [Message],
    name: &str,
) -> Option<(&'a serde_json::Map<String, serde_json::Value>, DateTime<Utc>)> {
    msgs.iter()
        .flat_map(|m| m.tool_uses().into_iter().map(move |(n, input)| (n, input, m.timestamp)))
        .filter(|(n, _, _)| *n == name)
        .last()
        .map(|(_, input, ts)| (input, ts))
}

/// Messages after the last user message, or the whole transcript if there
/// is no user message (e.g. a subagent transcript with no user turn).
fn turn_messages(msgs: &[Message]) -> Vec<&Message> {
    match hn_transcript::last_user_timestamp(msgs) {
        Some(ts) => hn_transcript::messages_after(msgs, ts),
        None => msgs.iter().collect(),
    }
}

fn assistant_texts(msgs: &[&Message], n: usize) -> Vec<String> {
    msgs.iter()
        .filter(|m| matches!(m.role, Role::Assistant))
        .rev()
        .take(n)
        .rev()
        .map(|m| m.text())
        .filter(|t| !t.trim().is_empty())
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Question
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn question_summary(msgs: &[Message]) -> String {
    if let Some(last_ts) = last_assistant_timestamp(msgs) {
        if let Some((input, tool_ts)) = most_recent_tool_input(msgs, "AskUserQuestion") {
            if (last_ts - tool_ts).num_seconds().abs() <= QUESTION_TOOL_FRESHNESS_SECS {
                if let Some(q) = input
                    .get("questions")
                    .and_then(|v| v.as_array())
                    .and_then(|a| a.first())
                    .and_then(|q| q.get("question"))
                    .and_then(|v| v.as_str())
                {
                    return q.to_string();
                }
            }
        }
    }

    let window = turn_messages(msgs);
    let candidates: Vec<String> = assistant_texts(&window, QUESTION_WINDOW)
        .into_iter()
        .filter(|t| t.contains('?'))
        .filter(|t| t.chars().count() > 10)
        .collect();
    if let Some(shortest) = candidates.into_iter().min_by_key(|s| s.chars().count()) {
        return shortest;
    }

    if let Some(last) = last_assistant(msgs) {
        let text = last.text();
        if !text.trim().is_empty() {
            let candidate = first_sentence(&text);
            if candidate.chars().count() >= 10 {
                return candidate;
            }
        }
    }

    DEFAULT_QUESTION.to_string()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PlanReady
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn plan_ready_summary(msgs: &[Message]) -> String {
    let Some((input, _)) = most_recent_tool_input(msgs, "ExitPlanMode") else {
        return DEFAULT_PLAN_READY.to_string();
    };
    let Some(plan) = input.get("plan").and_then(|v| v.as_str()) else {
        return DEFAULT_PLAN_READY.to_string();
    };
    // Line selection must happen before `clean_markdown` flattens newlines,
    // so strip per-line prefixes first and only then run inline stripping
    // on the chosen line.
    plan.lines()
        .map(strip_line_prefix)
        .map(|l| l.trim().to_string())
        .find(|l| !l.is_empty())
        .map(|l| collapse_whitespace(&strip_inline(&l)))
        .unwrap_or_else(|| DEFAULT_PLAN_READY.to_string())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ReviewComplete
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn review_complete_summary(msgs: &[Message]) -> String {
    let window = turn_messages(msgs);

    for text in assistant_texts(&window, REVIEW_WINDOW) {
        for sentence in split_sentences(&text) {
            let lower = sentence.to_lowercase();
            if REVIEW_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
                return sentence;
            }
        }
    }

    let tools = hn_transcript::extract_tools(&window);
    let read_count = tools.iter().filter(|t| t.name == "Read").count();
    if read_count >= 1 {
        return format!("Reviewed {read_count} file(s)");
    }

    DEFAULT_REVIEW_COMPLETE.to_string()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TaskComplete
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn task_complete_summary(msgs: &[Message]) -> String {
    let actions = task_actions(msgs);
    let duration = task_duration(msgs);

    let text = last_assistant(msgs)
        .map(|m| m.text())
        .filter(|t| !t.trim().is_empty())
        .map(|t| {
            let cleaned = clean_markdown(&t);
            if cleaned.chars().count() <= MAX_LEN {
                cleaned
            } else {
                first_sentence(&cleaned)
            }
        });

    let mut parts: Vec<String> = Vec::new();
    if let Some(t) = text {
        parts.push(t.trim_end_matches('.').to_string());
    }
    if let Some(a) = actions {
        parts.push(a);
    }
    if let Some(d) = duration {
        parts.push(d);
    }

    if parts.is_empty() {
        return DEFAULT_TASK_COMPLETE.to_string();
    }
    format!("{}.", parts.join(". "))
}

fn task_actions(msgs: &[Message]) -> Option<String> {
    let Some(ts) = hn_transcript::last_user_timestamp(msgs) else {
        return None;
    };
    let after = hn_transcript::messages_after(msgs, ts);
    let tools = hn_transcript::extract_tools(&after);

    let created = tools.iter().filter(|t| t.name == "Write").count();
    let edited = tools.iter().filter(|t| t.name == "Edit").count();
    let ran = tools.iter().filter(|t| t.name == "Bash").count();

    let mut parts = Vec::new();
    if created > 0 {
        parts.push(format!("Created {created} file(s)"));
    }
    if edited > 0 {
        parts.push(format!("Edited {edited} file(s)"));
    }
    if ran > 0 {
        parts.push(format!("Ran {ran} command(s)"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn task_duration(msgs: &[Message]) -> Option<String> {
    let start = hn_transcript::last_user_timestamp(msgs)?;
    let end = last_assistant_timestamp(msgs)?;
    Some(format_duration(end - start))
}

fn format_duration(d: chrono::Duration) -> String {
    let secs = d.num_seconds().max(0);
    if secs < 60 {
        format!("Took {secs}s")
    } else if secs < 3600 {
        format!("Took {}m {}s", secs / 60, secs % 60)
    } else {
        format!("Took {}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hn_domain::model::{Content, ContentPart};
    use serde_json::json;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn user(t: &str, text: &str) -> Message {
        Message { role: Role::User, timestamp: ts(t), content: Content::Plain(text.into()) }
    }

    fn assistant_text(t: &str, text: &str) -> Message {
        Message { role: Role::Assistant, timestamp: ts(t), content: Content::Plain(text.into()) }
    }

    fn assistant_tool(t: &str, name: &str, input: serde_json::Value) -> Message {
        Message {
            role: Role::Assistant,
            timestamp: ts(t),
            content: Content::Parts(vec![ContentPart::ToolUse {
                name: name.into(),
                input: input.as_object().cloned().unwrap_or_default(),
            }]),
        }
    }

    #[test]
    fn question_prefers_fresh_ask_user_question_tool() {
        let msgs = vec![
            user("2026-01-01T00:00:00Z", "go"),
            assistant_tool(
                "2026-01-01T00:00:10Z",
                "AskUserQuestion",
                json!({"questions": [{"question": "Use TypeScript or plain JS?"}]}),
            ),
        ];
        assert_eq!(summarize(Status::Question, &msgs), "Use TypeScript or plain JS?");
    }

    #[test]
    fn question_ignores_stale_ask_user_question_tool() {
        let msgs = vec![
            user("2026-01-01T00:00:00Z", "go"),
            assistant_tool(
                "2026-01-01T00:00:01Z",
                "AskUserQuestion",
                json!({"questions": [{"question": "stale one?"}]}),
            ),
            assistant_text("2026-01-01T00:05:00Z", "Should I use Postgres or SQLite here?"),
        ];
        assert_eq!(summarize(Status::Question, &msgs), "Should I use Postgres or SQLite here?");
    }

    #[test]
    fn question_uses_first_sentence_of_last_assistant_text_as_last_resort() {
        let msgs = vec![user("2026-01-01T00:00:00Z", "go"), assistant_text("2026-01-01T00:00:01Z", "Working on it now.")];
        assert_eq!(summarize(Status::Question, &msgs), "Working on it now.");
    }

    #[test]
    fn question_falls_back_to_default_when_nothing_found() {
        let msgs = vec![user("2026-01-01T00:00:00Z", "go"), assistant_tool("2026-01-01T00:00:01Z", "Bash", json!({}))];
        assert_eq!(summarize(Status::Question, &msgs), "Claude needs your input to continue");
    }

    #[test]
    fn plan_ready_takes_first_non_empty_line_of_plan() {
        let msgs = vec![assistant_tool(
            "2026-01-01T00:00:00Z",
            "ExitPlanMode",
            json!({"plan": "\n\n## Plan\nRefactor the auth module first.\nThen add tests."}),
        )];
        assert_eq!(summarize(Status::PlanReady, &msgs), "Plan");
    }

    #[test]
    fn review_complete_uses_sentence_with_keyword() {
        let msgs = vec![
            user("2026-01-01T00:00:00Z", "check this"),
            assistant_text(
                "2026-01-01T00:00:05Z",
                "I looked at the files. I reviewed the auth module for issues. All clear.",
            ),
        ];
        assert_eq!(summarize(Status::ReviewComplete, &msgs), "I reviewed the auth module for issues.");
    }

    #[test]
    fn review_complete_falls_back_to_read_count() {
        let msgs = vec![
            user("2026-01-01T00:00:00Z", "check this"),
            assistant_tool("2026-01-01T00:00:05Z", "Read", json!({"path": "a.rs"})),
            assistant_tool("2026-01-01T00:00:06Z", "Read", json!({"path": "b.rs"})),
        ];
        assert_eq!(summarize(Status::ReviewComplete, &msgs), "Reviewed 2 file(s)");
    }

    #[test]
    fn review_complete_defaults_when_nothing_available() {
        let msgs = vec![user("2026-01-01T00:00:00Z", "check this"), assistant_tool("2026-01-01T00:00:05Z", "Bash", json!({}))];
        assert_eq!(summarize(Status::ReviewComplete, &msgs), "Code review completed.");
    }

    #[test]
    fn task_complete_combines_text_actions_and_duration() {
        let msgs = vec![
            user("2026-01-01T00:00:00Z", "add the endpoint"),
            assistant_tool("2026-01-01T00:00:05Z", "Write", json!({"path": "a.rs"})),
            assistant_tool("2026-01-01T00:00:06Z", "Edit", json!({"path": "b.rs"})),
            assistant_tool("2026-01-01T00:00:07Z", "Bash", json!({"command": "cargo fmt"})),
            assistant_text("2026-01-01T00:01:05Z", "Added the new endpoint and wired it up"),
        ];
        let out = summarize(Status::TaskComplete, &msgs);
        assert!(out.contains("Added the new endpoint"));
        assert!(out.contains("Created 1 file(s)"));
        assert!(out.contains("Edited 1 file(s)"));
        assert!(out.contains("Ran 1 command(s)"));
        assert!(out.contains("Took 1m 5s"));
    }

    #[test]
    fn task_complete_falls_back_when_nothing_available() {
        let msgs = vec![assistant_tool("2026-01-01T00:00:00Z", "TodoWrite", json!({}))];
        assert_eq!(summarize(Status::TaskComplete, &msgs), "Task completed successfully.");
    }

    #[test]
    fn session_limit_and_api_error_are_fixed_strings() {
        assert_eq!(summarize(Status::SessionLimitReached, &[]), "Session limit reached. Please start a new conversation.");
        assert_eq!(summarize(Status::ApiError, &[]), "Please run /login");
    }

    #[test]
    fn summarize_never_exceeds_150_codepoints() {
        let long_plan = "x".repeat(400);
        let msgs = vec![assistant_tool("2026-01-01T00:00:00Z", "ExitPlanMode", json!({"plan": long_plan}))];
        assert!(summarize(Status::PlanReady, &msgs).chars().count() <= MAX_LEN);
    }

    #[test]
    fn summarize_is_idempotent_on_its_own_output() {
        let msgs = vec![
            user("2026-01-01T00:00:00Z", "go"),
            assistant_text("2026-01-01T00:00:01Z", "**Done!** Refactored the `parser` module cleanly."),
        ];
        let once = summarize(Status::TaskComplete, &msgs);
        let twice = finalize(&once);
        assert_eq!(once, twice);
    }
}
