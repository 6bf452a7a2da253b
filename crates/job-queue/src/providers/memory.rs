//! In-memory queue provider implementation for testing and development.
//!
//! Implements the same lease semantics as SQS:
//! - A received message is hidden until its visibility timeout runs out
//! - Receipts stop working once their lease has expired
//! - Expired leases put the message back at the front of the queue
//! - Each redelivery increments the delivery count
//!
//! Cloning the provider shares the underlying storage, so a test can keep a
//! handle for inspection while a queue owns another.

use crate::client::QueueProvider;
use crate::error::QueueError;
use crate::message::{
    Message, MessageId, QueueName, QueueUrl, ReceiptHandle, ReceiveOptions, ReceivedMessage,
    Timestamp,
};
use crate::provider::{InMemoryConfig, ProviderType};
use async_trait::async_trait;
use chrono::Duration;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use tokio::time::Instant;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// URL scheme of queues owned by this provider
const URL_SCHEME: &str = "memory://";

/// Interval between checks while long-polling an empty queue
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Thread-safe storage for all queues, keyed by queue URL
struct QueueStorage {
    queues: HashMap<QueueUrl, InMemoryQueue>,
    config: InMemoryConfig,
}

/// Internal queue state for a single queue
#[derive(Default)]
struct InMemoryQueue {
    /// Visible messages in delivery order
    messages: VecDeque<StoredMessage>,
    /// Leased messages by receipt handle
    in_flight: HashMap<String, InFlightMessage>,
}

impl InMemoryQueue {
    fn len(&self) -> usize {
        self.messages.len() + self.in_flight.len()
    }

    /// Return messages whose lease ran out to the front of the queue
    fn release_expired_leases(&mut self) {
        let now = Timestamp::now();
        let mut expired: Vec<InFlightMessage> = Vec::new();

        self.in_flight.retain(|_, in_flight| {
            if in_flight.lease_expires_at <= now {
                expired.push(in_flight.clone());
                false
            } else {
                true
            }
        });

        // Oldest first once pushed to the front
        expired.sort_by(|a, b| b.message.enqueued_at.cmp(&a.message.enqueued_at));
        for in_flight in expired {
            self.messages.push_front(in_flight.message);
        }
    }

    /// Lease the next visible message, if any
    fn lease_next(&mut self, visibility_timeout: Duration) -> Option<ReceivedMessage> {
        self.release_expired_leases();

        let mut message = self.messages.pop_front()?;
        let delivered_at = Timestamp::now();
        message.delivery_count += 1;
        let first_delivered_at = message
            .first_delivered_at
            .get_or_insert_with(|| delivered_at.clone())
            .clone();

        let receipt = uuid::Uuid::new_v4().to_string();
        let lease_expires_at = delivered_at.plus(visibility_timeout);

        let received = ReceivedMessage {
            message_id: message.message_id.clone(),
            body: message.body.clone(),
            attributes: message.attributes.clone(),
            correlation_id: message.correlation_id.clone(),
            receipt_handle: ReceiptHandle::new(
                receipt.clone(),
                lease_expires_at.clone(),
                ProviderType::InMemory,
            ),
            delivery_count: message.delivery_count,
            first_delivered_at,
            delivered_at,
        };

        self.in_flight.insert(
            receipt,
            InFlightMessage {
                message,
                lease_expires_at,
            },
        );

        Some(received)
    }

    /// Delete the leased message identified by `receipt`
    fn delete(&mut self, receipt: &str) -> Result<(), QueueError> {
        let not_found = || QueueError::MessageNotFound {
            receipt: receipt.to_string(),
        };

        let lease_expired = self
            .in_flight
            .get(receipt)
            .ok_or_else(not_found)?
            .lease_expires_at
            <= Timestamp::now();

        if lease_expired {
            self.release_expired_leases();
            return Err(not_found());
        }

        self.in_flight.remove(receipt);
        Ok(())
    }
}

/// A message stored in the queue with metadata
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: String,
    attributes: HashMap<String, String>,
    correlation_id: Option<String>,
    enqueued_at: Timestamp,
    delivery_count: u32,
    first_delivered_at: Option<Timestamp>,
}

impl StoredMessage {
    fn from_message(message: &Message, message_id: MessageId) -> Self {
        Self {
            message_id,
            body: message.body.clone(),
            attributes: message.attributes.clone(),
            correlation_id: message.correlation_id.clone(),
            enqueued_at: Timestamp::now(),
            delivery_count: 0,
            first_delivered_at: None,
        }
    }
}

/// A message currently leased to a consumer
#[derive(Clone)]
struct InFlightMessage {
    message: StoredMessage,
    lease_expires_at: Timestamp,
}

/// Snapshot of how many messages a queue holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDepth {
    /// Messages available for receiving
    pub visible: usize,
    /// Messages leased and not yet deleted
    pub in_flight: usize,
}

// ============================================================================
// InMemoryProvider
// ============================================================================

/// In-memory queue provider implementation
#[derive(Clone)]
pub struct InMemoryProvider {
    storage: Arc<RwLock<QueueStorage>>,
}

impl InMemoryProvider {
    /// Create new in-memory provider with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            storage: Arc::new(RwLock::new(QueueStorage {
                queues: HashMap::new(),
                config,
            })),
        }
    }

    /// Create a queue, returning its URL; existing queues are left untouched
    pub fn create_queue(&self, queue: &QueueName) -> Result<QueueUrl, QueueError> {
        let url = Self::queue_url(queue);
        let mut storage = self.storage.write().map_err(lock_poisoned)?;
        storage.queues.entry(url.clone()).or_default();
        Ok(url)
    }

    /// Current depth of a queue, counting expired leases as visible
    pub fn queue_depth(&self, queue: &QueueUrl) -> Result<QueueDepth, QueueError> {
        let mut storage = self.storage.write().map_err(lock_poisoned)?;
        let state = storage
            .queues
            .get_mut(queue)
            .ok_or_else(|| queue_not_found(queue))?;
        state.release_expired_leases();

        Ok(QueueDepth {
            visible: state.messages.len(),
            in_flight: state.in_flight.len(),
        })
    }

    fn queue_url(queue: &QueueName) -> QueueUrl {
        QueueUrl::new(format!("{}{}", URL_SCHEME, queue))
    }

    fn try_receive(
        &self,
        queue: &QueueUrl,
        visibility_timeout: Duration,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        let mut storage = self.storage.write().map_err(lock_poisoned)?;
        let state = storage
            .queues
            .get_mut(queue)
            .ok_or_else(|| queue_not_found(queue))?;

        Ok(state.lease_next(visibility_timeout))
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

#[async_trait]
impl QueueProvider for InMemoryProvider {
    async fn resolve_queue(&self, queue: &QueueName) -> Result<QueueUrl, QueueError> {
        let url = Self::queue_url(queue);
        let mut storage = self.storage.write().map_err(lock_poisoned)?;

        if !storage.queues.contains_key(&url) {
            if !storage.config.auto_create_queues {
                return Err(QueueError::QueueNotFound {
                    queue_name: queue.to_string(),
                });
            }
            storage.queues.insert(url.clone(), InMemoryQueue::default());
        }

        Ok(url)
    }

    async fn send_message(
        &self,
        queue: &QueueUrl,
        message: &Message,
    ) -> Result<MessageId, QueueError> {
        let max_size = ProviderType::InMemory.max_message_size();
        if message.body.len() > max_size {
            return Err(QueueError::MessageTooLarge {
                size: message.body.len(),
                max_size,
            });
        }

        let mut storage = self.storage.write().map_err(lock_poisoned)?;
        let max_queue_size = storage.config.max_queue_size;
        let state = storage
            .queues
            .get_mut(queue)
            .ok_or_else(|| queue_not_found(queue))?;

        if state.len() >= max_queue_size {
            return Err(QueueError::ProviderError {
                provider: ProviderType::InMemory.to_string(),
                code: "QueueFull".to_string(),
                message: format!("Queue {} holds {} messages", queue, max_queue_size),
            });
        }

        let message_id = MessageId::new();
        state
            .messages
            .push_back(StoredMessage::from_message(message, message_id.clone()));

        Ok(message_id)
    }

    async fn receive_message(
        &self,
        queue: &QueueUrl,
        options: &ReceiveOptions,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        let wait_time = options
            .wait_time
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        let deadline = Instant::now() + wait_time;

        loop {
            if let Some(message) = self.try_receive(queue, options.visibility_timeout)? {
                return Ok(Some(message));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn delete_message(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        let mut storage = self.storage.write().map_err(lock_poisoned)?;
        storage
            .queues
            .get_mut(queue)
            .ok_or_else(|| queue_not_found(queue))?
            .delete(receipt.handle())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}

fn queue_not_found(queue: &QueueUrl) -> QueueError {
    QueueError::QueueNotFound {
        queue_name: queue
            .as_str()
            .strip_prefix(URL_SCHEME)
            .unwrap_or(queue.as_str())
            .to_string(),
    }
}

fn lock_poisoned<T>(error: std::sync::PoisonError<T>) -> QueueError {
    QueueError::ProviderError {
        provider: ProviderType::InMemory.to_string(),
        code: "LockPoisoned".to_string(),
        message: error.to_string(),
    }
}
