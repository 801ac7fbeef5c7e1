//! Per-session cooldown bookkeeping, persisted to `state/<session>.json` so
//! the cooldown windows are visible across concurrent hook processes for the
//! same session.
//!
//! Every read-modify-write cycle takes an OS-advisory exclusive lock on the
//! session's own file via [`fs4`] — best-effort, since not every platform
//! honors advisory locks, but it's the only cross-process primitive this
//! layer needs (unlike the dedup manager, no atomic-`mkdir` trick is
//! required: lost updates here only widen or narrow a cooldown window by a
//! few milliseconds, never break at-most-once delivery).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fs4::FileExt;
use hn_domain::model::{SessionState, Status, STATE_SCHEMA_VERSION};

const DEFAULT_GC_TTL_HOURS: i64 = 24;

pub struct SessionStateManager {
    state_dir: PathBuf,
}

impl SessionStateManager {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        let state_dir = base_dir.as_ref().join("state");
        if let Err(e) = std::fs::create_dir_all(&state_dir) {
            tracing::warn!(path = %state_dir.display(), error = %e, "could not prepare session state directory");
        }
        Self { state_dir }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.state_dir.join(format!("{}.json", sanitize(session_id)))
    }

    /// Load the persisted state for `session_id`, or a freshly created one
    /// if this is the first observation of that session.
    pub fn load_or_create(&self, session_id: &str, now: DateTime<Utc>) -> SessionState {
        self.with_locked_file(session_id, |existing| {
            existing.unwrap_or_else(|| SessionState::new(session_id, now))
        })
    }

    /// Record a committed notification: `last_any_notification_at` always
    /// moves forward; `last_task_complete_at` moves forward only for a
    /// `TaskComplete` notification. Called by the dedup manager's commit
    /// callback, never speculatively before the send is known to succeed.
    pub fn record_notification(&self, session_id: &str, status: Status, fingerprint: &str, at: DateTime<Utc>) {
        self.with_locked_file(session_id, |existing| {
            let mut state = existing.unwrap_or_else(|| SessionState::new(session_id, at));
            state.last_any_notification_at = Some(at);
            if status == Status::TaskComplete {
                state.last_task_complete_at = Some(at);
            }
            state.last_status_fingerprint = Some(fingerprint.to_string());
            state
        });
    }

    /// Whether a `Question` notification for this session should be
    /// suppressed at `now`, per the two cooldown clocks in spec §4.5.
    pub fn should_suppress_question(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
        suppress_after_task_complete: Duration,
        suppress_after_any_notification: Duration,
    ) -> bool {
        let Some(state) = self.read(session_id) else {
            return false;
        };
        if within_window(state.last_task_complete_at, now, suppress_after_task_complete) {
            return true;
        }
        within_window(state.last_any_notification_at, now, suppress_after_any_notification)
    }

    /// Delete the persisted state for a session (Stop hook, non-subagent).
    pub fn delete(&self, session_id: &str) {
        let path = self.path_for(session_id);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete session state");
            }
        }
    }

    /// Ambient GC: remove any session state with no activity in the last
    /// `ttl_hours` (default 24h), for sessions whose Stop hook never fired
    /// (e.g. the host crashed or the plugin was disabled mid-session).
    pub fn gc(&self) {
        self.gc_with_ttl(chrono::Duration::hours(DEFAULT_GC_TTL_HOURS));
    }

    pub fn gc_with_ttl(&self, ttl: chrono::Duration) {
        let Ok(entries) = std::fs::read_dir(&self.state_dir) else { return };
        let now = Utc::now();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(raw) = std::fs::read_to_string(&path) else { continue };
            let Ok(state) = serde_json::from_str::<SessionState>(&raw) else {
                // Unparseable or schema-mismatched file — drop it rather
                // than fail the whole GC pass.
                let _ = std::fs::remove_file(&path);
                continue;
            };
            let last_activity = [state.last_any_notification_at, state.last_task_complete_at, Some(state.created_at)]
                .into_iter()
                .flatten()
                .max()
                .unwrap_or(state.created_at);
            if now.signed_duration_since(last_activity) > ttl {
                let _ = std::fs::remove_file(&path);
            }
        }
    }

    fn read(&self, session_id: &str) -> Option<SessionState> {
        let raw = std::fs::read_to_string(self.path_for(session_id)).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Open-lock-read-mutate-write-unlock cycle against the session's file.
    /// Lock failures are logged and treated as a no-op lock (proceed
    /// unsynchronized) — this layer is best-effort, never a hard dependency.
    fn with_locked_file(&self, session_id: &str, mutate: impl FnOnce(Option<SessionState>) -> SessionState) -> SessionState {
        let path = self.path_for(session_id);
        let file = match OpenOptions::new().read(true).write(true).create(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not open session state file");
                return mutate(None);
            }
        };
        if let Err(e) = file.lock_exclusive() {
            tracing::warn!(path = %path.display(), error = %e, "could not lock session state file, proceeding unsynchronized");
        }
        let result = self.read_mutate_write(file, mutate);
        result
    }

    fn read_mutate_write(&self, mut file: File, mutate: impl FnOnce(Option<SessionState>) -> SessionState) -> SessionState {
        let mut raw = String::new();
        let _ = file.read_to_string(&mut raw);
        let existing = serde_json::from_str::<SessionState>(&raw).ok();

        let mut next = mutate(existing);
        next.schema_version = STATE_SCHEMA_VERSION;

        if let Ok(body) = serde_json::to_string_pretty(&next) {
            let _ = file.seek(SeekFrom::Start(0));
            if file.set_len(0).and_then(|_| file.write_all(body.as_bytes())).is_err() {
                tracing::warn!("failed to persist session state");
            }
        }
        let _ = fs4::FileExt::unlock(&file);
        next
    }
}

fn within_window(at: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    let Some(at) = at else { return false };
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
    now.signed_duration_since(at) <= window && now >= at
}

/// Session IDs are host-controlled strings; defensively strip path
/// separators so a crafted session id can't escape the state directory.
fn sanitize(session_id: &str) -> String {
    session_id.chars().map(|c| if c == '/' || c == '\\' || c == '.' { '_' } else { c }).collect()
}
