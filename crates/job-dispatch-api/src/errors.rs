//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use job_queue::QueueError;
use tracing::{error, warn};

/// Job submission errors with HTTP status code mapping
///
/// - `400 Bad Request`: the body is not a valid job request; do not retry
/// - `413 Payload Too Large`: the body exceeds the configured limit
/// - `503 Service Unavailable`: the queue failed transiently; retry later
/// - `500 Internal Server Error`: the queue rejected the job otherwise
///
/// Queue failure details are logged server-side; clients get a generic message.
#[derive(Debug, thiserror::Error)]
pub enum JobHandlerError {
    /// Body could not be read or does not describe a job
    #[error("Invalid job request: {message}")]
    InvalidRequest { message: String },

    /// Body exceeds `server.max_body_size`
    #[error("Payload too large (max: {max_size} bytes)")]
    PayloadTooLarge { max_size: usize },

    /// Enqueueing failed
    #[error("Failed to enqueue job: {0}")]
    ProduceFailed(#[from] QueueError),
}

impl JobHandlerError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ProduceFailed(QueueError::MessageTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::ProduceFailed(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            Self::ProduceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for JobHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (message, retry_after) = match &self {
            Self::InvalidRequest { .. } | Self::PayloadTooLarge { .. } => {
                warn!(error = %self, "Rejected job request");
                (self.to_string(), None)
            }
            Self::ProduceFailed(QueueError::MessageTooLarge { .. }) => {
                warn!(error = %self, "Rejected job request");
                (self.to_string(), None)
            }
            Self::ProduceFailed(e) => {
                error!(error = %e, transient = e.is_transient(), "Failed to enqueue job");
                let retry_after = e
                    .is_transient()
                    .then(|| e.retry_after().map(|d| d.num_seconds().max(1)))
                    .flatten();
                (
                    "Failed to enqueue job. Please try again later.".to_string(),
                    retry_after,
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}
