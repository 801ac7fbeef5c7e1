//! Tool-sequence state machine: classifies the current turn into one of
//! six statuses plus `Unknown`. Rules are evaluated top to bottom — first
//! match wins, matching the teacher's preference for a straight-line
//! sequence of early returns over a generic rule table at this size.

use hn_domain::model::{Message, Status, ACTIVE_TOOLS, PLANNING_TOOLS, READLIKE_TOOLS};

const WINDOW_SIZE: usize = 15;
const TRAILING_TEXT_SAMPLE: usize = 5;
const REVIEW_TEXT_THRESHOLD: usize = 200;

/// Classify the current turn from a fully parsed transcript.
///
/// `notify_on_text_response` mirrors `notifications.notifyOnTextResponse`.
pub fn classify(msgs: &[Message], notify_on_text_response: bool) -> Status {
    let all_refs: Vec<&Message> = msgs.iter().collect();

    // Rule 1: session limit reached.
    let last_three = hn_transcript::last_n_assistant_messages(&all_refs, 3);
    if matches_session_limit(&last_three) {
        return Status::SessionLimitReached;
    }

    // Rule 2: API error + login prompt, both present somewhere in the
    // trailing window.
    if matches_api_error(&last_three) {
        return Status::ApiError;
    }

    // Rule 3: current-turn window.
    let last_user_ts = match hn_transcript::last_user_timestamp(msgs) {
        Some(ts) => ts,
        None => return Status::Unknown,
    };
    let after = hn_transcript::messages_after(msgs, last_user_ts);
    let window: Vec<&Message> = after
        .into_iter()
        .rev()
        .take(WINDOW_SIZE)
        .rev()
        .collect();
    if window.is_empty() {
        return Status::Unknown;
    }

    // Rule 4: tool-driven classification on the window.
    let tools = hn_transcript::extract_tools(&window);
    if !tools.is_empty() {
        let last = tools.last().expect("checked non-empty");

        if last.name == "ExitPlanMode" {
            return Status::PlanReady;
        }
        if last.name == "AskUserQuestion" {
            return Status::Question;
        }
        if let Some(plan_tool) = tools.iter().find(|t| t.name == "ExitPlanMode") {
            // A tool "follows" the plan only if it occurs strictly after the
            // plan's own enclosing message — tools emitted concurrently
            // within the same assistant message as ExitPlanMode don't count
            // as execution of that plan (resolves the spec's documented
            // ExitPlanMode/same-message open question).
            let plan_executed = tools
                .iter()
                .any(|t| t.position > plan_tool.position && t.timestamp > plan_tool.timestamp);
            if plan_executed {
                return Status::TaskComplete;
            }
        }
        let has_readlike = tools.iter().any(|t| READLIKE_TOOLS.contains(&t.name.as_str()));
        let has_active = tools.iter().any(|t| ACTIVE_TOOLS.contains(&t.name.as_str()));
        if has_readlike && !has_active {
            let trailing_text = hn_transcript::extract_recent_text(&window, TRAILING_TEXT_SAMPLE);
            if trailing_text.chars().count() > REVIEW_TEXT_THRESHOLD {
                return Status::ReviewComplete;
            }
            // Falls through: short trailing text after a read-only turn
            // isn't substantial enough to call a review — treated below
            // as a generic tool-driven completion.
        }
        if ACTIVE_TOOLS.contains(&last.name.as_str()) {
            return Status::TaskComplete;
        }
        // Some other tool (WebFetch, WebSearch, Task, …) was used last.
        return Status::TaskComplete;
    }

    // Rule 5: text-only response fallback.
    if notify_on_text_response {
        return Status::TaskComplete;
    }

    // Rule 6.
    Status::Unknown
}

/// `PreToolUse` events bypass transcript analysis entirely.
pub fn classify_pre_tool_use(tool_name: &str) -> Status {
    if tool_name == "ExitPlanMode" {
        Status::PlanReady
    } else if tool_name == "AskUserQuestion" {
        Status::Question
    } else {
        Status::Unknown
    }
}

fn matches_session_limit(last_three: &[&Message]) -> bool {
    let text = concat_text(last_three).to_lowercase();
    text.contains("session limit reached") || text.contains("session limit has been reached")
}

fn matches_api_error(last_three: &[&Message]) -> bool {
    let text = concat_text(last_three).to_lowercase();
    let has_401 = text.contains("api error: 401") || text.contains("api error 401");
    let has_login = text.contains("please run /login") || text.contains("run /login");
    has_401 && has_login
}

fn concat_text(msgs: &[&Message]) -> String {
    msgs.iter().map(|m| m.text()).collect::<Vec<_>>().join(" ")
}

#[allow(dead_code)]
fn planning_tool_names() -> &'static [&'static str] {
    PLANNING_TOOLS
}
