//! # Job Dispatch HTTP API
//!
//! Producer entry point of the job dispatch pipeline: accepts job requests
//! over HTTP and enqueues their payload on the configured queue.
//!
//! Endpoints:
//! - `POST /jobs` with `{"message": "..."}` enqueues one job
//! - `GET /health` reports liveness and the bound queue
//!
//! Every enqueued job carries the request's `x-request-id` (generated when
//! the client sends none) as its correlation id, and the id is echoed back
//! in the response.

pub mod config;
pub mod errors;
pub mod responses;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

pub use config::{LoggingConfig, ServerConfig, ServiceConfig};
pub use errors::{ConfigError, JobHandlerError, ServiceError};
pub use responses::{CreateJobRequest, CreateJobResponse, HealthResponse};

use axum::{
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use job_queue::{Message, Queue, Timestamp};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

/// Header carrying the id correlating a job with the request that created it
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied request id that is kept
const MAX_REQUEST_ID_LENGTH: usize = 128;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Queue jobs are produced to
    pub queue: Arc<dyn Queue>,

    /// HTTP server settings
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(queue: Arc<dyn Queue>, config: ServerConfig) -> Self {
        Self { queue, config }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.max_body_size;

    Router::new()
        .route("/jobs", post(handle_create_job))
        .route("/health", get(handle_health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Serve the API until `shutdown` fires
///
/// In-flight requests are given `shutdown_timeout_seconds` to finish once
/// shutdown starts.
pub async fn start_server(
    config: ServerConfig,
    queue: Arc<dyn Queue>,
    shutdown: CancellationToken,
) -> Result<(), ServiceError> {
    config.validate()?;
    let addr = config.socket_addr()?;
    let shutdown_timeout = std::time::Duration::from_secs(config.shutdown_timeout_seconds);

    let app = create_router(AppState::new(queue, config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: addr.to_string(),
            message: e.to_string(),
        })?;

    info!(address = %addr, "Starting HTTP API server");

    let graceful = shutdown.clone();
    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .await
    };
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result.map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?,
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!("HTTP API server shutdown complete");
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Enqueue the job described by the request body
///
/// The body is parsed before anything is enqueued; a body that is not a
/// JSON object with a string `message` is rejected with 400.
#[instrument(
    skip(state, headers, body),
    fields(queue = %state.queue.queue_name(), request_id = tracing::field::Empty)
)]
pub async fn handle_create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<([(&'static str, String); 1], Json<CreateJobResponse>), JobHandlerError> {
    let request_id = request_id(&headers);
    tracing::Span::current().record("request_id", request_id.as_str());

    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            JobHandlerError::PayloadTooLarge {
                max_size: state.config.max_body_size,
            }
        } else {
            JobHandlerError::InvalidRequest {
                message: rejection.body_text(),
            }
        }
    })?;

    let request: CreateJobRequest =
        serde_json::from_slice(&body).map_err(|e| JobHandlerError::InvalidRequest {
            message: e.to_string(),
        })?;

    let message = Message::new(request.message).with_correlation_id(request_id.clone());
    let message_id = state.queue.produce_message(message).await?;

    info!(message_id = %message_id, "Job enqueued");

    Ok((
        [(REQUEST_ID_HEADER, request_id)],
        Json(CreateJobResponse::queued(message_id)),
    ))
}

/// Client-supplied request id if usable, otherwise a fresh one
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LENGTH)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Basic health check endpoint
#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        queue: state.queue.queue_name().to_string(),
        timestamp: Timestamp::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
