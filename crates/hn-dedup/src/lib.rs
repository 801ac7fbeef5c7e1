//! At-most-once notification delivery across concurrent hook processes.
//!
//! Two-phase protocol over a shared filesystem directory used purely as a
//! lock namespace: `reserve()` atomically creates a directory named after
//! `(session_id, status, content_fingerprint)` — `mkdir` either succeeds
//! exclusively or fails with `AlreadyExists`, giving us a lock primitive
//! that works across unrelated processes without a daemon. `commit()` or
//! `release()` settles the reservation depending on whether the downstream
//! send succeeded.
//!
//! This layer is advisory: if the lock namespace can't be written to at
//! all, we log and let the caller proceed unsuppressed rather than block
//! notifications on a broken filesystem.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use hn_domain::model::{NotificationRecord, Status, STATE_SCHEMA_VERSION};
use sha2::{Digest, Sha256};

const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(180);
const DEFAULT_DUP_WINDOW: Duration = Duration::from_secs(180);
const MAX_REGISTRY_RECORDS: usize = 1000;
const REGISTRY_RETENTION_HOURS: i64 = 24;

/// Normalize a message for fingerprinting: lowercase, trim trailing
/// punctuation/whitespace. Two messages that normalize identically are
/// treated as the same notification.
fn normalize(message: &str) -> String {
    message
        .to_lowercase()
        .trim_end_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .trim()
        .to_string()
}

/// Content fingerprint used both as part of the lock directory name and as
/// the key for cross-(session,status) duplicate detection.
pub fn fingerprint(message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(message).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Outcome of a reservation attempt.
pub enum ReserveOutcome {
    /// This process owns the emission; settle it with `commit` or `release`.
    Reserved(Lock),
    /// Another process already owns this emission (or an identical one was
    /// sent recently under a different session/status) — drop it.
    Suppressed,
}

/// A held reservation. `dir` is `None` when the lock namespace was
/// unavailable at reserve time — the caller still proceeds, just without a
/// real cross-process lock backing it.
pub struct Lock {
    dir: Option<PathBuf>,
    session_id: String,
    status: Status,
    fingerprint: String,
}

pub struct DedupManager {
    lock_dir: PathBuf,
    registry_path: PathBuf,
    lock_ttl: Duration,
    dup_window: Duration,
}

impl DedupManager {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self::with_windows(base_dir, DEFAULT_LOCK_TTL, DEFAULT_DUP_WINDOW)
    }

    pub fn with_windows(base_dir: impl AsRef<Path>, lock_ttl: Duration, dup_window: Duration) -> Self {
        let base_dir = base_dir.as_ref();
        let lock_dir = base_dir.join("lock");
        if let Err(e) = fs::create_dir_all(&lock_dir) {
            tracing::warn!(path = %lock_dir.display(), error = %e, "could not prepare dedup lock directory");
        }
        Self {
            lock_dir,
            registry_path: base_dir.join("registry.jsonl"),
            lock_ttl,
            dup_window,
        }
    }

    /// Phase 1: attempt to claim `(session_id, status, fingerprint(message))`.
    pub fn reserve(&self, session_id: &str, status: Status, message: &str) -> ReserveOutcome {
        let fp = fingerprint(message);
        let now = Utc::now();

        if self.has_recent_duplicate(&fp, now) {
            tracing::debug!(session_id, status = status.key(), "suppressing: identical content sent recently under another key");
            return ReserveOutcome::Suppressed;
        }

        let lock_path = self.lock_dir.join(format!("{session_id}-{}-{fp}", status.key()));
        match fs::create_dir(&lock_path) {
            Ok(()) => {
                self.stamp_lock(&lock_path, now);
                ReserveOutcome::Reserved(Lock {
                    dir: Some(lock_path),
                    session_id: session_id.to_string(),
                    status,
                    fingerprint: fp,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!(session_id, status = status.key(), "suppressing: reservation already held");
                ReserveOutcome::Suppressed
            }
            Err(e) => {
                tracing::warn!(path = %lock_path.display(), error = %e, "dedup lock namespace unavailable, proceeding unsuppressed");
                ReserveOutcome::Reserved(Lock { dir: None, session_id: session_id.to_string(), status, fingerprint: fp })
            }
        }
    }

    fn stamp_lock(&self, lock_path: &Path, now: DateTime<Utc>) {
        let marker = lock_path.join("reserved_at");
        if let Err(e) = fs::write(&marker, now.to_rfc3339()) {
            tracing::warn!(path = %marker.display(), error = %e, "failed to stamp dedup lock");
        }
    }

    /// Phase 2, success path: record the sent notification. The lock
    /// directory itself is left in place until `gc()` reclaims it past its
    /// TTL — removing it immediately would let an in-flight duplicate hook
    /// slip through before the registry write below is even durable.
    pub fn commit(&self, lock: Lock) {
        let record = NotificationRecord {
            schema_version: STATE_SCHEMA_VERSION,
            session_id: lock.session_id,
            status: lock.status,
            content_fingerprint: lock.fingerprint,
            sent_at: Utc::now(),
        };
        if let Err(e) = self.append_record(record) {
            tracing::warn!(error = %e, "failed to append dedup registry record");
        }
    }

    /// Phase 2, failure path: release the reservation immediately so a
    /// retry from another hook invocation can claim it.
    pub fn release(&self, lock: Lock) {
        if let Some(dir) = &lock.dir {
            if let Err(e) = fs::remove_dir_all(dir) {
                tracing::warn!(path = %dir.display(), error = %e, "failed to release dedup lock");
            }
        }
    }

    fn has_recent_duplicate(&self, fp: &str, now: DateTime<Utc>) -> bool {
        let window = chrono::Duration::from_std(self.dup_window).unwrap_or(chrono::Duration::seconds(180));
        self.read_registry()
            .iter()
            .any(|r| r.content_fingerprint == fp && now.signed_duration_since(r.sent_at) <= window)
    }

    fn read_registry(&self) -> Vec<NotificationRecord> {
        let Ok(data) = fs::read_to_string(&self.registry_path) else {
            return Vec::new();
        };
        data.lines().filter_map(|line| serde_json::from_str(line).ok()).collect()
    }

    fn append_record(&self, record: NotificationRecord) -> io::Result<()> {
        let mut records = self.read_registry();
        records.push(record);
        while records.len() > MAX_REGISTRY_RECORDS {
            records.remove(0);
        }
        let body = records
            .iter()
            .filter_map(|r| serde_json::to_string(r).ok())
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(&self.registry_path, format!("{body}\n"))
    }

    /// Ambient GC: unconditionally remove any lock directory older than
    /// `lock_ttl * 2` (stale from a process that crashed before releasing),
    /// and drop registry records past the retention window.
    pub fn gc(&self) {
        self.gc_stale_locks();
        self.gc_old_records();
    }

    fn gc_stale_locks(&self) {
        let Ok(entries) = fs::read_dir(&self.lock_dir) else { return };
        let now = Utc::now();
        let max_age = chrono::Duration::from_std(self.lock_ttl * 2).unwrap_or(chrono::Duration::seconds(360));
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let age_exceeded = match lock_reserved_at(&path) {
                Some(reserved_at) => now.signed_duration_since(reserved_at) > max_age,
                None => true, // no stamp we can trust — treat as stale.
            };
            if age_exceeded {
                let _ = fs::remove_dir_all(&path);
            }
        }
    }

    fn gc_old_records(&self) {
        let now = Utc::now();
        let mut records = self.read_registry();
        let before = records.len();
        records.retain(|r| now.signed_duration_since(r.sent_at) <= chrono::Duration::hours(REGISTRY_RETENTION_HOURS));
        if records.len() != before {
            let body = records
                .iter()
                .filter_map(|r| serde_json::to_string(r).ok())
                .collect::<Vec<_>>()
                .join("\n");
            let _ = fs::write(&self.registry_path, format!("{body}\n"));
        }
    }
}

fn lock_reserved_at(lock_dir: &Path) -> Option<DateTime<Utc>> {
    let raw = fs::read_to_string(lock_dir.join("reserved_at")).ok()?;
    DateTime::parse_from_rfc3339(raw.trim()).ok().map(|d| d.with_timezone(&Utc))
}
