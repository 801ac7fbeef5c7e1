//! Desktop notification backends. The backend trait itself is a thin shim —
//! per the facade's scope, the only OS collaborator this crate ships is
//! macOS's `osascript`, with a logging fallback for every other host.
//!
//! `OsaScriptBackend` is grounded directly in
//! `sa-node-macos/src/platform/applescript.rs`'s `run`/`classify_output`
//! shape, including its TCC/Automation-denial detection.

use hn_domain::error::{Error, Result};

pub trait DesktopBackend: Send + Sync {
    fn send(&self, title: &str, body: &str) -> Result<()>;
}

/// Sends via `osascript -e 'display notification ...'`. Only ever
/// constructed on macOS; see [`default_backend`].
pub struct OsaScriptBackend;

impl DesktopBackend for OsaScriptBackend {
    fn send(&self, title: &str, body: &str) -> Result<()> {
        let script = format!(
            r#"display notification "{}" with title "{}""#,
            escape_applescript(body),
            escape_applescript(title)
        );
        run_osascript(&script)
    }
}

fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn run_osascript(script: &str) -> Result<()> {
    let output = std::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .map_err(|e| Error::NotifierBackendUnavailable(format!("failed to run osascript: {e}")))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr_lower = stderr.to_ascii_lowercase();
    if stderr_lower.contains("not allowed assistive access")
        || stderr_lower.contains("not authorized to send apple events")
        || stderr_lower.contains("application isn't running")
        || stderr_lower.contains("erraeventnotpermitted")
        || stderr_lower.contains("-1743")
    {
        return Err(Error::NotifierBackendUnavailable(format!(
            "automation_denied: {}. Fix: open System Settings → Privacy & Security → Automation, \
             and allow this app to control the target application.",
            stderr.trim()
        )));
    }

    Err(Error::NotifierBackendUnavailable(format!("osascript exited with {}: {}", output.status, stderr.trim())))
}

/// Logs the notification instead of displaying it. Used on any host without
/// a supported desktop backend, and in tests.
pub struct LogBackend;

impl DesktopBackend for LogBackend {
    fn send(&self, title: &str, body: &str) -> Result<()> {
        tracing::info!(title, body, "desktop notification (no native backend on this host)");
        Ok(())
    }
}

#[cfg(target_os = "macos")]
pub fn default_backend() -> Box<dyn DesktopBackend> {
    Box::new(OsaScriptBackend)
}

#[cfg(not(target_os = "macos"))]
pub fn default_backend() -> Box<dyn DesktopBackend> {
    Box::new(LogBackend)
}
