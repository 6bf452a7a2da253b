//! Provider types and configuration.

use crate::error::ConfigurationError;
use crate::message::{QueueName, ReceiveOptions};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Longest long-poll wait SQS accepts
pub const MAX_WAIT_TIME_SECONDS: u32 = 20;

/// Longest visibility timeout SQS accepts (12 hours)
pub const MAX_VISIBILITY_TIMEOUT_SECONDS: u32 = 43_200;

/// Enumeration of supported queue providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    AwsSqs,
    InMemory,
}

impl ProviderType {
    /// Get maximum message size for provider
    pub fn max_message_size(&self) -> usize {
        match self {
            Self::AwsSqs => 256 * 1024,         // 256KB
            Self::InMemory => 10 * 1024 * 1024, // 10MB
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwsSqs => write!(f, "AwsSqs"),
            Self::InMemory => write!(f, "InMemory"),
        }
    }
}

/// Configuration for a queue binding: which backend, which queue, how to poll it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Name resolved to a backend reference at startup
    pub queue_name: String,
    pub provider: ProviderConfig,
    pub consumer: ConsumerConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_name: "jobs".to_string(),
            provider: ProviderConfig::AwsSqs(AwsSqsConfig::default()),
            consumer: ConsumerConfig::default(),
        }
    }
}

impl QueueConfig {
    /// Validate the queue name and consumer bounds
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        QueueName::new(self.queue_name.clone()).map_err(|e| ConfigurationError::Invalid {
            message: format!("queue.queue_name: {}", e),
        })?;

        self.consumer.validate()?;

        if let ProviderConfig::AwsSqs(aws) = &self.provider {
            aws.validate()?;
            if aws.request_timeout_seconds <= u64::from(self.consumer.wait_time_seconds) {
                return Err(ConfigurationError::Invalid {
                    message: "aws request_timeout_seconds must exceed consumer wait_time_seconds"
                        .to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Provider-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    AwsSqs(AwsSqsConfig),
    InMemory(InMemoryConfig),
}

impl ProviderConfig {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::AwsSqs(_) => ProviderType::AwsSqs,
            Self::InMemory(_) => ProviderType::InMemory,
        }
    }
}

/// AWS SQS configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSqsConfig {
    pub region: String,
    /// Service endpoint; `None` targets the public regional endpoint
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for AwsSqsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: Some("http://localhost:44566".to_string()),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            request_timeout_seconds: 30,
        }
    }
}

impl AwsSqsConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.region.is_empty() {
            return Err(ConfigurationError::Missing {
                key: "queue.provider.region".to_string(),
            });
        }

        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(ConfigurationError::Invalid {
                message: "access_key_id and secret_access_key must be set together".to_string(),
            });
        }

        Ok(())
    }

    /// Endpoint requests are sent to
    pub fn resolved_endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) if !endpoint.is_empty() => endpoint.trim_end_matches('/').to_string(),
            _ => format!("https://sqs.{}.amazonaws.com", self.region),
        }
    }
}

/// In-memory provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryConfig {
    pub max_queue_size: usize,
    /// Create queues on first resolution instead of failing with `QueueNotFound`
    pub auto_create_queues: bool,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10000,
            auto_create_queues: true,
        }
    }
}

/// Polling behavior of a consumption loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Long-poll wait per receive call
    pub wait_time_seconds: u32,
    /// Lease granted to each received message
    pub visibility_timeout_seconds: u32,
    /// Capacity of the error stream; errors beyond it are logged and dropped
    pub error_buffer_size: usize,
    /// Pause after a failed cycle; zero re-polls immediately
    pub error_backoff_millis: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            wait_time_seconds: 1,
            visibility_timeout_seconds: 10,
            error_buffer_size: 64,
            error_backoff_millis: 0,
        }
    }
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.wait_time_seconds > MAX_WAIT_TIME_SECONDS {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "consumer.wait_time_seconds must be at most {}",
                    MAX_WAIT_TIME_SECONDS
                ),
            });
        }

        if self.visibility_timeout_seconds == 0
            || self.visibility_timeout_seconds > MAX_VISIBILITY_TIMEOUT_SECONDS
        {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "consumer.visibility_timeout_seconds must be 1-{}",
                    MAX_VISIBILITY_TIMEOUT_SECONDS
                ),
            });
        }

        if self.error_buffer_size == 0 {
            return Err(ConfigurationError::Invalid {
                message: "consumer.error_buffer_size must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    pub fn receive_options(&self) -> ReceiveOptions {
        ReceiveOptions::new()
            .with_wait_time(Duration::seconds(i64::from(self.wait_time_seconds)))
            .with_visibility_timeout(Duration::seconds(i64::from(
                self.visibility_timeout_seconds,
            )))
    }

    /// Backoff after a failed cycle, `None` when disabled
    pub fn error_backoff(&self) -> Option<std::time::Duration> {
        (self.error_backoff_millis > 0)
            .then(|| std::time::Duration::from_millis(self.error_backoff_millis))
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
