//! Request and response bodies of the HTTP API.

use job_queue::{MessageId, Timestamp};
use serde::{Deserialize, Serialize};

/// Body of `POST /jobs`
///
/// The payload is forwarded to the queue verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CreateJobRequest {
    #[serde(alias = "Message")]
    pub message: String,
}

/// Job accepted response
#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub message_id: MessageId,
    pub status: String,
}

impl CreateJobResponse {
    pub fn queued(message_id: MessageId) -> Self {
        Self {
            message_id,
            status: "queued".to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub queue: String,
    pub timestamp: Timestamp,
    pub version: String,
}
