//! End-to-end tests driving the compiled `hook-notify` binary exactly as
//! the host would: one JSON payload piped to stdin, `PLUGIN_ROOT` pointed
//! at a scratch directory per test.

use std::io::Write;
use std::process::{Command, Stdio};

fn run(args: &[&str], stdin: &str, plugin_root: &std::path::Path) -> std::process::ExitStatus {
    let mut child = Command::new(env!("CARGO_BIN_EXE_hook-notify"))
        .args(args)
        .env("PLUGIN_ROOT", plugin_root)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn hook-notify");
    child.stdin.take().unwrap().write_all(stdin.as_bytes()).unwrap();
    child.wait().expect("hook-notify did not exit")
}

#[test]
fn handle_hook_pre_tool_use_with_unknown_tool_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let status = run(&["handle-hook", "PreToolUse"], r#"{"session_id":"s1","tool_name":"Write"}"#, dir.path());
    assert!(status.success());
}

#[test]
fn handle_hook_notification_idle_prompt_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let status = run(
        &["handle-hook", "Notification"],
        r#"{"session_id":"s1","notification_type":"idle_prompt"}"#,
        dir.path(),
    );
    assert!(status.success());
}

#[test]
fn handle_hook_malformed_stdin_still_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let status = run(&["handle-hook", "Stop"], "not json", dir.path());
    assert!(status.success());
}

#[test]
fn version_command_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let status = run(&["version"], "", dir.path());
    assert!(status.success());
}

#[test]
fn unknown_subcommand_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let status = run(&["not-a-real-command"], "", dir.path());
    assert!(!status.success());
}

#[test]
fn second_identical_pre_tool_use_is_deduped_and_still_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let payload = r#"{"session_id":"s1","tool_name":"ExitPlanMode"}"#;
    let first = run(&["handle-hook", "PreToolUse"], payload, dir.path());
    let second = run(&["handle-hook", "PreToolUse"], payload, dir.path());
    assert!(first.success());
    assert!(second.success());
    // The dedup lock directory created by the first invocation should
    // still be on disk — the second invocation observed it and suppressed.
    let lock_dir = dir.path().join("lock");
    let entries: Vec<_> = std::fs::read_dir(&lock_dir).unwrap().collect();
    assert_eq!(entries.len(), 1);
}
