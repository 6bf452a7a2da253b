//! Tests for the HTTP router and server lifecycle.

use super::*;
use async_trait::async_trait;
use axum::{body::Body, http::Request};
use job_queue::{
    InMemoryProvider, Message, MessageId, ProviderType, QueueError, QueueName, QueueProvider,
    QueueUrl, ReceiptHandle, ReceiveOptions, ReceivedMessage, StandardQueue,
};
use tower::ServiceExt;

// ============================================================================
// Test Helpers
// ============================================================================

/// Provider whose sends always fail with the error built by `error`
struct FailingProvider {
    error: fn() -> QueueError,
}

#[async_trait]
impl QueueProvider for FailingProvider {
    async fn resolve_queue(&self, queue: &QueueName) -> Result<QueueUrl, QueueError> {
        Ok(QueueUrl::new(format!("failing://{}", queue)))
    }

    async fn send_message(
        &self,
        _queue: &QueueUrl,
        _message: &Message,
    ) -> Result<MessageId, QueueError> {
        Err((self.error)())
    }

    async fn receive_message(
        &self,
        _queue: &QueueUrl,
        _options: &ReceiveOptions,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        Ok(None)
    }

    async fn delete_message(
        &self,
        _queue: &QueueUrl,
        _receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}

fn queue_name() -> QueueName {
    QueueName::new("jobs".to_string()).unwrap()
}

async fn memory_app(config: ServerConfig) -> (Router, InMemoryProvider, StandardQueue) {
    let provider = InMemoryProvider::default();
    let queue = StandardQueue::connect(
        Arc::new(provider.clone()),
        queue_name(),
        ReceiveOptions::new().with_wait_time(chrono::Duration::zero()),
    )
    .await
    .unwrap();

    let app = create_router(AppState::new(Arc::new(queue.clone()), config));
    (app, provider, queue)
}

async fn failing_app(error: fn() -> QueueError) -> Router {
    let queue = StandardQueue::connect(
        Arc::new(FailingProvider { error }),
        queue_name(),
        ReceiveOptions::default(),
    )
    .await
    .unwrap();

    create_router(AppState::new(Arc::new(queue), ServerConfig::default()))
}

fn post_job(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/jobs")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// POST /jobs
// ============================================================================

#[tokio::test]
async fn test_create_job_enqueues_payload() {
    // Arrange
    let (app, provider, queue) = memory_app(ServerConfig::default()).await;

    // Act
    let response = app
        .oneshot(post_job(r#"{"message":"hello"}"#))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "queued");
    assert!(body["message_id"].as_str().is_some_and(|id| !id.is_empty()));

    let received = provider
        .receive_message(queue.queue_url(), queue.receive_options())
        .await
        .unwrap()
        .expect("job should be on the queue");
    assert_eq!(received.body, "hello");
    assert_eq!(received.message_id.as_str(), body["message_id"].as_str().unwrap());
}

#[tokio::test]
async fn test_create_job_forwards_request_id_as_correlation_id() {
    let (app, provider, queue) = memory_app(ServerConfig::default()).await;
    let request = Request::builder()
        .method("POST")
        .uri("/jobs")
        .header("content-type", "application/json")
        .header("x-request-id", "req-1234")
        .body(Body::from(r#"{"message":"traced"}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-1234");
    let received = provider
        .receive_message(queue.queue_url(), queue.receive_options())
        .await
        .unwrap()
        .expect("job should be on the queue");
    assert_eq!(received.correlation_id.as_deref(), Some("req-1234"));
}

#[tokio::test]
async fn test_create_job_generates_request_id_when_absent() {
    let (app, provider, queue) = memory_app(ServerConfig::default()).await;

    let response = app
        .oneshot(post_job(r#"{"message":"untraced"}"#))
        .await
        .unwrap();

    let generated = response.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(!generated.is_empty());
    let received = provider
        .receive_message(queue.queue_url(), queue.receive_options())
        .await
        .unwrap()
        .expect("job should be on the queue");
    assert_eq!(received.correlation_id, Some(generated));
}

#[tokio::test]
async fn test_create_job_accepts_capitalised_field() {
    let (app, provider, queue) = memory_app(ServerConfig::default()).await;

    let response = app
        .oneshot(post_job(r#"{"Message":"from a legacy client"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(provider.queue_depth(queue.queue_url()).unwrap().visible, 1);
}

#[tokio::test]
async fn test_create_job_rejects_malformed_bodies_before_enqueueing() {
    for body in [
        "not json",
        "{}",
        r#"{"message": 42}"#,
        r#"["hello"]"#,
        "",
    ] {
        let (app, provider, queue) = memory_app(ServerConfig::default()).await;

        let response = app.oneshot(post_job(body)).await.unwrap();

        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "body {:?} should be rejected",
            body
        );
        let json = json_body(response).await;
        assert_eq!(json["status"], 400);
        assert!(json["timestamp"].is_string());
        assert_eq!(provider.queue_depth(queue.queue_url()).unwrap().visible, 0);
    }
}

#[tokio::test]
async fn test_create_job_rejects_oversized_body() {
    let config = ServerConfig {
        max_body_size: 32,
        ..ServerConfig::default()
    };
    let (app, provider, queue) = memory_app(config).await;
    let body = format!(r#"{{"message":"{}"}}"#, "x".repeat(64));

    let response = app.oneshot(post_job(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(provider.queue_depth(queue.queue_url()).unwrap().visible, 0);
}

#[tokio::test]
async fn test_transient_queue_failure_returns_503_with_retry_after() {
    let app = failing_app(|| QueueError::ConnectionFailed {
        message: "connection refused".to_string(),
    })
    .await;

    let response = app
        .oneshot(post_job(r#"{"message":"hello"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["Retry-After"], "5");
    let body = json_body(response).await;
    assert!(!body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_permanent_queue_failure_returns_500() {
    let app = failing_app(|| QueueError::AuthenticationFailed {
        message: "InvalidClientTokenId: secret detail".to_string(),
    })
    .await;

    let response = app
        .oneshot(post_job(r#"{"message":"hello"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get("Retry-After").is_none());
    let body = json_body(response).await;
    assert!(!body["error"].as_str().unwrap().contains("secret detail"));
}

#[tokio::test]
async fn test_rejected_job_returns_500_without_retry_after() {
    let app = failing_app(|| QueueError::RequestRejected {
        provider: "AwsSqs".to_string(),
        code: "InvalidMessageContents".to_string(),
        message: "invalid characters".to_string(),
    })
    .await;

    let response = app
        .oneshot(post_job(r#"{"message":"hello"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get("Retry-After").is_none());
    let body = json_body(response).await;
    assert_eq!(body["status"], 500);
}

#[tokio::test]
async fn test_get_jobs_is_not_allowed() {
    let (app, _provider, _queue) = memory_app(ServerConfig::default()).await;

    let response = app
        .oneshot(Request::builder().uri("/jobs").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[test]
fn test_error_status_mapping() {
    assert_eq!(
        JobHandlerError::ProduceFailed(QueueError::MessageTooLarge {
            size: 300_000,
            max_size: 262_144,
        })
        .status_code(),
        StatusCode::PAYLOAD_TOO_LARGE
    );
    assert_eq!(
        JobHandlerError::ProduceFailed(QueueError::Timeout {
            duration: chrono::Duration::seconds(30),
        })
        .status_code(),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        JobHandlerError::ProduceFailed(QueueError::QueueNotFound {
            queue_name: "jobs".to_string(),
        })
        .status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

// ============================================================================
// GET /health
// ============================================================================

#[tokio::test]
async fn test_health_check_reports_queue() {
    let (app, _provider, _queue) = memory_app(ServerConfig::default()).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["queue"], "jobs");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

// ============================================================================
// Server Lifecycle
// ============================================================================

#[tokio::test]
async fn test_server_stops_when_cancelled() {
    let (_app, _provider, queue) = memory_app(ServerConfig::default()).await;
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    };
    let shutdown = CancellationToken::new();

    let server = tokio::spawn(start_server(config, Arc::new(queue), shutdown.clone()));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    shutdown.cancel();

    let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
        .await
        .expect("server should stop after cancellation")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_server_reports_bind_failure() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let (_app, _provider, queue) = memory_app(ServerConfig::default()).await;
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..ServerConfig::default()
    };

    let result = start_server(config, Arc::new(queue), CancellationToken::new()).await;

    assert!(matches!(result, Err(ServiceError::BindFailed { .. })));
}
