//! Hook router (spec §4.6): decodes one hook payload, classifies it,
//! generates a summary, runs dedup + cooldown, and dispatches the
//! notifier facade. One router per process invocation — no shared
//! in-process state survives past `main`.

use std::path::Path;

use chrono::Utc;
use hn_dedup::{DedupManager, ReserveOutcome};
use hn_domain::config::Config;
use hn_domain::model::{Message, Status};
use hn_notify::NotifierFacade;
use hn_sessionstate::SessionStateManager;

use crate::hook::{HookEvent, HookPayload};

const HOST_BACKGROUND_MODE_ENV: &str = "HOST_BACKGROUND_MODE";

pub struct Router<'a> {
    cfg: &'a Config,
    dedup: DedupManager,
    sessions: SessionStateManager,
    notifier: &'a NotifierFacade,
}

impl<'a> Router<'a> {
    pub fn new(cfg: &'a Config, state_dir: &Path, notifier: &'a NotifierFacade) -> Self {
        Self {
            cfg,
            dedup: DedupManager::new(state_dir),
            sessions: SessionStateManager::new(state_dir),
            notifier,
        }
    }

    /// Dispatch one hook event. Errors are logged by callers, never
    /// propagated past `main`'s panic guard — see spec §4.6 step 3.
    pub async fn handle(&self, event: HookEvent, payload: HookPayload) {
        self.dedup.gc();
        self.sessions.gc();

        match event {
            HookEvent::PreToolUse => self.handle_pre_tool_use(payload).await,
            HookEvent::Notification => self.handle_notification(payload).await,
            HookEvent::Stop => self.handle_stop(payload, false).await,
            HookEvent::SubagentStop => self.handle_stop(payload, true).await,
        }
    }

    async fn handle_pre_tool_use(&self, payload: HookPayload) {
        let Some(tool_name) = payload.tool_name.as_deref() else {
            return;
        };
        let status = hn_classify::classify_pre_tool_use(tool_name);
        if status == Status::Unknown {
            return;
        }
        let msgs = load_transcript(payload.transcript_path.as_deref());
        let message = hn_summary::summarize(status, &msgs);
        self.dispatch(&payload.session_id, status, &message).await;
    }

    async fn handle_notification(&self, payload: HookPayload) {
        if payload.notification_type.as_deref() != Some("permission_prompt") {
            return;
        }
        let msgs = load_transcript(payload.transcript_path.as_deref());
        let message = hn_summary::summarize(Status::Question, &msgs);
        self.dispatch(&payload.session_id, Status::Question, &message).await;
    }

    async fn handle_stop(&self, payload: HookPayload, is_subagent: bool) {
        if is_subagent && !self.cfg.notifications.notify_on_subagent_stop {
            return;
        }
        if host_background_mode() {
            tracing::debug!(session_id = %payload.session_id, "HOST_BACKGROUND_MODE active, skipping Stop notification");
            return;
        }

        let Some(transcript_path) = payload.transcript_path.as_deref() else {
            tracing::warn!(session_id = %payload.session_id, "Stop hook fired without a transcript_path");
            if !is_subagent {
                self.sessions.delete(&payload.session_id);
            }
            return;
        };
        let msgs = load_transcript(Some(transcript_path));
        let status = hn_classify::classify(&msgs, self.cfg.notifications.notify_on_text_response);
        if status != Status::Unknown {
            let message = hn_summary::summarize(status, &msgs);
            self.dispatch(&payload.session_id, status, &message).await;
        }

        if !is_subagent {
            self.sessions.delete(&payload.session_id);
        }
    }

    /// Shared cooldown + dedup + notify path for every status-bearing
    /// event. `Question` additionally honors the two cooldown clocks from
    /// §4.5 before even attempting a dedup reservation.
    async fn dispatch(&self, session_id: &str, status: Status, message: &str) {
        let now = Utc::now();

        if status == Status::Question {
            let suppress_after_task_complete =
                std::time::Duration::from_secs(self.cfg.notifications.suppress_question_after_task_complete_seconds);
            let suppress_after_any = std::time::Duration::from_secs(
                self.cfg.notifications.suppress_question_after_any_notification_seconds,
            );
            if self
                .sessions
                .should_suppress_question(session_id, now, suppress_after_task_complete, suppress_after_any)
            {
                tracing::debug!(session_id, "question suppressed by cooldown");
                return;
            }
        }

        let lock = match self.dedup.reserve(session_id, status, message) {
            ReserveOutcome::Reserved(lock) => lock,
            ReserveOutcome::Suppressed => {
                tracing::debug!(session_id, status = status.key(), "notification suppressed by dedup");
                return;
            }
        };

        let title = self.cfg.status_title(&status);
        if let Err(e) = self.notifier.send_desktop(self.cfg, status, message) {
            tracing::warn!(session_id, error = %e, "desktop notification failed");
        }
        if let Err(e) = self
            .notifier
            .send_webhook(&self.cfg.notifications.webhook, status, &title, message, session_id)
            .await
        {
            tracing::warn!(session_id, error = %e, "webhook notification failed");
        }

        let fp = hn_dedup::fingerprint(message);
        self.dedup.commit(lock);
        self.sessions.record_notification(session_id, status, &fp, now);
    }
}

fn load_transcript(path: Option<&str>) -> Vec<Message> {
    let Some(path) = path else { return Vec::new() };
    match hn_transcript::read(Path::new(path)) {
        Ok(msgs) => msgs,
        Err(e) => {
            tracing::warn!(path, error = %e, "failed to read transcript");
            Vec::new()
        }
    }
}

fn host_background_mode() -> bool {
    std::env::var(HOST_BACKGROUND_MODE_ENV)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hn_domain::config::Config;
    use hn_notify::{DesktopBackend, NotifierFacade};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingBackend(Arc<AtomicUsize>);

    impl DesktopBackend for CountingBackend {
        fn send(&self, _title: &str, _body: &str) -> hn_domain::error::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn router(cfg: &Config, dir: &Path, notifier: &NotifierFacade) -> Router<'_> {
        Router::new(cfg, dir, notifier)
    }

    #[tokio::test]
    async fn pre_tool_use_with_unrecognized_tool_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = NotifierFacade::with_backend(Box::new(CountingBackend(calls.clone()))).unwrap();
        let r = router(&cfg, dir.path(), &notifier);

        r.handle(
            HookEvent::PreToolUse,
            HookPayload {
                session_id: "s1".into(),
                transcript_path: None,
                cwd: None,
                tool_name: Some("Write".into()),
                hook_event_name: None,
                notification_type: None,
            },
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pre_tool_use_exit_plan_mode_dispatches_desktop_notification() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = NotifierFacade::with_backend(Box::new(CountingBackend(calls.clone()))).unwrap();
        let r = router(&cfg, dir.path(), &notifier);

        r.handle(
            HookEvent::PreToolUse,
            HookPayload {
                session_id: "s1".into(),
                transcript_path: None,
                cwd: None,
                tool_name: Some("ExitPlanMode".into()),
                hook_event_name: None,
                notification_type: None,
            },
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_pre_tool_use_is_suppressed_on_second_call() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = NotifierFacade::with_backend(Box::new(CountingBackend(calls.clone()))).unwrap();
        let r = router(&cfg, dir.path(), &notifier);

        let payload = || HookPayload {
            session_id: "s1".into(),
            transcript_path: None,
            cwd: None,
            tool_name: Some("ExitPlanMode".into()),
            hook_event_name: None,
            notification_type: None,
        };
        r.handle(HookEvent::PreToolUse, payload()).await;
        r.handle(HookEvent::PreToolUse, payload()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn notification_idle_prompt_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = NotifierFacade::with_backend(Box::new(CountingBackend(calls.clone()))).unwrap();
        let r = router(&cfg, dir.path(), &notifier);

        r.handle(
            HookEvent::Notification,
            HookPayload {
                session_id: "s1".into(),
                transcript_path: None,
                cwd: None,
                tool_name: None,
                hook_event_name: None,
                notification_type: Some("idle_prompt".into()),
            },
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn subagent_stop_is_skipped_unless_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        assert!(!cfg.notifications.notify_on_subagent_stop);
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = NotifierFacade::with_backend(Box::new(CountingBackend(calls.clone()))).unwrap();
        let r = router(&cfg, dir.path(), &notifier);

        r.handle(
            HookEvent::SubagentStop,
            HookPayload {
                session_id: "s1".into(),
                transcript_path: None,
                cwd: None,
                tool_name: None,
                hook_event_name: None,
                notification_type: None,
            },
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_without_transcript_path_still_deletes_session_state() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = NotifierFacade::with_backend(Box::new(CountingBackend(calls.clone()))).unwrap();
        let r = router(&cfg, dir.path(), &notifier);
        let first = r.sessions.load_or_create("s1", Utc::now());

        r.handle(
            HookEvent::Stop,
            HookPayload {
                session_id: "s1".into(),
                transcript_path: None,
                cwd: None,
                tool_name: None,
                hook_event_name: None,
                notification_type: None,
            },
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let later = Utc::now() + chrono::Duration::seconds(5);
        let recreated = r.sessions.load_or_create("s1", later);
        assert_ne!(recreated.created_at, first.created_at);
    }

    #[tokio::test]
    async fn host_background_mode_suppresses_stop_notification() {
        std::env::set_var(HOST_BACKGROUND_MODE_ENV, "true");
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = NotifierFacade::with_backend(Box::new(CountingBackend(calls.clone()))).unwrap();
        let r = router(&cfg, dir.path(), &notifier);

        let mut f = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(f, r#"{{"type":"user","timestamp":"2026-01-01T00:00:00Z","content":"hi"}}"#).unwrap();
        writeln!(f, r#"{{"type":"assistant","timestamp":"2026-01-01T00:00:01Z","content":"All done!"}}"#).unwrap();

        r.handle(
            HookEvent::Stop,
            HookPayload {
                session_id: "s1".into(),
                transcript_path: Some(f.path().to_string_lossy().to_string()),
                cwd: None,
                tool_name: None,
                hook_event_name: None,
                notification_type: None,
            },
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        std::env::remove_var(HOST_BACKGROUND_MODE_ENV);
    }
}
