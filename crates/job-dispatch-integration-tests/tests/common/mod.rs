//! Shared fixtures for the job dispatch integration tests
//!
//! - In-memory queues with short leases
//! - A recording job handler that can be told to fail
//! - Helpers for driving the HTTP router

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use job_dispatch_api::{create_router, AppState, ServerConfig};
use job_queue::{
    InMemoryProvider, Job, MessageHandler, MessageId, QueueName, ReceiveOptions, StandardQueue,
};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

// ============================================================================
// Queues
// ============================================================================

/// In-memory queue named `jobs` with the given lease and a short long-poll
#[allow(dead_code)]
pub async fn memory_queue(visibility: chrono::Duration) -> (StandardQueue, InMemoryProvider) {
    let provider = InMemoryProvider::default();
    let queue = StandardQueue::connect(
        Arc::new(provider.clone()),
        QueueName::new("jobs".to_string()).unwrap(),
        ReceiveOptions::new()
            .with_wait_time(chrono::Duration::milliseconds(20))
            .with_visibility_timeout(visibility),
    )
    .await
    .unwrap();
    (queue, provider)
}

#[allow(dead_code)]
pub fn router(queue: &StandardQueue) -> Router {
    create_router(AppState::new(
        Arc::new(queue.clone()),
        ServerConfig::default(),
    ))
}

// ============================================================================
// HTTP
// ============================================================================

/// POST `body` to `/jobs` and return the status and JSON body
pub async fn post_job(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/jobs")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Enqueue `payload` through the HTTP API and return the assigned message id
#[allow(dead_code)]
pub async fn submit(app: Router, payload: &str) -> String {
    let body = serde_json::json!({ "message": payload }).to_string();
    let (status, json) = post_job(app, &body).await;
    assert_eq!(status, StatusCode::OK, "unexpected response: {}", json);
    json["message_id"].as_str().unwrap().to_string()
}

// ============================================================================
// Handler
// ============================================================================

/// One handler invocation as seen by [`RecordingHandler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub payload: String,
    pub message_id: MessageId,
    pub correlation_id: Option<String>,
    pub delivery_count: u32,
    pub succeeded: bool,
}

/// Handler recording every delivery; fails the first `failures` of them
#[derive(Clone, Default)]
pub struct RecordingHandler {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
    failures: usize,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn failing_first(failures: usize) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn succeeded(&self) -> Vec<Delivery> {
        self.deliveries()
            .into_iter()
            .filter(|d| d.succeeded)
            .collect()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, job: Job) -> anyhow::Result<()> {
        let mut deliveries = self.deliveries.lock().unwrap();
        let succeeded = deliveries.len() >= self.failures;
        deliveries.push(Delivery {
            payload: job.payload().to_string(),
            message_id: job.message_id().clone(),
            correlation_id: job.correlation_id().map(str::to_string),
            delivery_count: job.delivery_count(),
            succeeded,
        });

        if succeeded {
            Ok(())
        } else {
            Err(anyhow::anyhow!("simulated failure #{}", deliveries.len()))
        }
    }
}

// ============================================================================
// Timing
// ============================================================================

/// Poll `condition` until it holds, panicking after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
