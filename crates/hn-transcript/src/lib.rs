//! Streaming reader for the append-only NDJSON transcript: one [`Message`]
//! per line. Malformed lines are skipped with a warning rather than
//! failing the whole read — only an unopenable file is a hard error.

use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use hn_domain::model::{Message, Role, Tool};
use hn_domain::{Error, Result};

/// Read and parse every line of a transcript file. Per-line parse errors
/// are logged and skipped; order is preserved even across parse failures.
pub fn read(path: &Path) -> Result<Vec<Message>> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::TranscriptUnreadable(format!("{}: {e}", path.display())))?;
    let reader = BufReader::new(file);

    let mut messages = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(path = %path.display(), lineno, error = %e, "failed to read transcript line");
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Message>(&line) {
            Ok(msg) => messages.push(msg),
            Err(e) => {
                tracing::warn!(path = %path.display(), lineno, error = %e, "skipping malformed transcript line");
            }
        }
    }
    Ok(messages)
}

/// Timestamp of the most recent user message, if any.
pub fn last_user_timestamp(msgs: &[Message]) -> Option<DateTime<Utc>> {
    msgs.iter()
        .rev()
        .find(|m| matches!(m.role, Role::User))
        .map(|m| m.timestamp)
}

/// Suffix of `msgs` whose timestamp is strictly after `ts`.
pub fn messages_after(msgs: &[Message], ts: DateTime<Utc>) -> Vec<&Message> {
    msgs.iter().filter(|m| m.timestamp > ts).collect()
}

/// Flattened, ordered list of tool uses across every message in `msgs`.
/// Ordering is: message order, then intra-message part order — tools used
/// concurrently within one assistant message are never re-grouped by
/// message boundary, only by their position in this flat sequence.
pub fn extract_tools(msgs: &[&Message]) -> Vec<Tool> {
    let mut tools = Vec::new();
    let mut position = 0usize;
    for msg in msgs {
        for (name, _input) in msg.tool_uses() {
            tools.push(Tool {
                name: name.to_string(),
                position,
                timestamp: msg.timestamp,
            });
            position += 1;
        }
    }
    tools
}

/// Position of the first tool named `name`, if present.
pub fn find_tool_position(tools: &[Tool], name: &str) -> Option<usize> {
    tools.iter().find(|t| t.name == name).map(|t| t.position)
}

/// Number of tools whose position is strictly after `pos`.
pub fn count_tools_after(tools: &[Tool], pos: usize) -> usize {
    tools.iter().filter(|t| t.position > pos).count()
}

/// Number of tools whose name is in `names`.
pub fn count_tools_by_names(tools: &[Tool], names: &[&str]) -> usize {
    tools.iter().filter(|t| names.contains(&t.name.as_str())).count()
}

/// Whether any tool in `tools` has a name in `names`.
pub fn has_any(tools: &[Tool], names: &[&str]) -> bool {
    tools.iter().any(|t| names.contains(&t.name.as_str()))
}

/// The last `n` assistant messages, in original order.
pub fn last_n_assistant_messages<'a>(msgs: &'a [&'a Message], n: usize) -> Vec<&'a Message> {
    msgs.iter()
        .filter(|m| matches!(m.role, Role::Assistant))
        .rev()
        .take(n)
        .rev()
        .copied()
        .collect()
}

/// Concatenation of text parts from the last `n` assistant messages.
pub fn extract_recent_text(msgs: &[&Message], n: usize) -> String {
    last_n_assistant_messages(msgs, n)
        .iter()
        .map(|m| m.text())
        .collect::<Vec<_>>()
        .join(" ")
}
