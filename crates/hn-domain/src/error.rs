/// Shared error type used across the hook-notify crates.
///
/// Every variant maps to one of the error kinds in the design's error
/// handling section. Callers at the hook boundary treat all of these as
/// "log and fall back" — see `hn-cli`'s panic guard and dispatch loop.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("transcript unreadable: {0}")]
    TranscriptUnreadable(String),

    #[error("dedup unavailable: {0}")]
    DedupUnavailable(String),

    #[error("notifier backend unavailable: {0}")]
    NotifierBackendUnavailable(String),

    #[error("webhook transport error: {0}")]
    WebhookTransport(String),

    #[error("webhook returned HTTP {0}")]
    WebhookHttpStatus(u16),

    #[error("circuit open for endpoint {0}")]
    CircuitOpen(String),

    #[error("rate limit exceeded for endpoint {0}")]
    RateLimitExceeded(String),

    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
