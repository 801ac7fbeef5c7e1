//! Integration tests for the webhook engine against a real in-process
//! HTTP/1.1 server, in the style of the node client's WS protocol test:
//! a tiny hand-rolled listener rather than a mocking dependency.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hn_domain::config::{CircuitBreakerConfig, RetryConfig, WebhookConfig};
use hn_domain::model::{Preset, WebhookRequest};
use hn_webhook::WebhookEngine;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Boots a minimal HTTP/1.1 server that responds with `statuses[n % len]`
/// for the n-th request it accepts, then closes the connection. Good enough
/// to exercise retry-then-success and status-driven circuit behavior
/// without a real webhook endpoint.
async fn spawn_status_server(statuses: Vec<u16>) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else { return };
            let statuses = statuses.clone();
            let count = count_clone.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let n = count.fetch_add(1, Ordering::SeqCst);
                let status = statuses[n % statuses.len()];
                let reason = reason_phrase(status);
                let body = "{}";
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (addr, count)
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

fn request_to(addr: SocketAddr) -> WebhookRequest {
    WebhookRequest {
        url: format!("http://{addr}/"),
        preset: Preset::Custom,
        headers: Default::default(),
        body: serde_json::json!({"status": "task_complete"}),
        chat_id: None,
        request_id: "test-request".into(),
        attempt_number: 1,
    }
}

#[tokio::test]
async fn retries_transient_failure_then_succeeds() {
    let (addr, count) = spawn_status_server(vec![500, 200]).await;
    let engine = WebhookEngine::new().unwrap();
    let cfg = WebhookConfig {
        retry: RetryConfig { initial_backoff_ms: 5, max_backoff_ms: 20, max_attempts: 3 },
        ..WebhookConfig::default()
    };

    let result = engine.send_with_retry(request_to(addr), &cfg).await;
    assert!(result.is_ok(), "expected eventual success, got {result:?}");
    assert_eq!(count.load(Ordering::SeqCst), 2);

    let snap = engine.get_metrics();
    assert_eq!(snap.total, 1, "total counts the logical send, not each HTTP attempt");
    assert_eq!(snap.successful, 1);
    assert_eq!(snap.failed, 1);
    assert_eq!(snap.retried, 1);
}

#[tokio::test]
async fn exhausts_retries_on_persistent_failure() {
    let (addr, count) = spawn_status_server(vec![500]).await;
    let engine = WebhookEngine::new().unwrap();
    let cfg = WebhookConfig {
        retry: RetryConfig { initial_backoff_ms: 5, max_backoff_ms: 20, max_attempts: 2 },
        circuit_breaker: CircuitBreakerConfig { failure_threshold: 100, success_threshold: 1, open_timeout_ms: 60_000 },
        ..WebhookConfig::default()
    };

    let result = engine.send_with_retry(request_to(addr), &cfg).await;
    assert!(result.is_err());
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn non_retryable_status_fails_without_retry() {
    let (addr, count) = spawn_status_server(vec![401]).await;
    let engine = WebhookEngine::new().unwrap();
    let cfg = WebhookConfig {
        retry: RetryConfig { initial_backoff_ms: 5, max_backoff_ms: 20, max_attempts: 5 },
        ..WebhookConfig::default()
    };

    let result = engine.send_with_retry(request_to(addr), &cfg).await;
    assert!(result.is_err());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_send_to_complete() {
    let (addr, _count) = spawn_status_server(vec![200]).await;
    let engine = Arc::new(WebhookEngine::new().unwrap());
    let cfg = WebhookConfig::default();

    let sender = engine.clone();
    let req = request_to(addr);
    let handle = tokio::spawn(async move { sender.send(&req, &cfg).await });

    engine.shutdown(Duration::from_secs(2)).await;
    let result = handle.await.unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn circuit_opens_after_failures_and_rejects_without_network_call() {
    let (addr, count) = spawn_status_server(vec![500]).await;
    let engine = WebhookEngine::new().unwrap();
    let cfg = WebhookConfig {
        retry: RetryConfig { initial_backoff_ms: 1, max_backoff_ms: 5, max_attempts: 1 },
        circuit_breaker: CircuitBreakerConfig { failure_threshold: 1, success_threshold: 1, open_timeout_ms: 60_000 },
        ..WebhookConfig::default()
    };

    let _ = engine.send_with_retry(request_to(addr), &cfg).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    let result = engine.send_with_retry(request_to(addr), &cfg).await;
    assert!(result.is_err());
    // still 1: the second call was rejected by the open breaker, never hit the network.
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
