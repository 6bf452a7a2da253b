//! Queue contracts and the standard adapter binding a provider to one queue.

use crate::consumer::{self, ConsumeError, ConsumerHandle, ConsumerOptions, Job, MessageHandler};
use crate::error::QueueError;
use crate::message::{Message, MessageId, QueueName, QueueUrl, ReceiptHandle, ReceiveOptions, ReceivedMessage};
use crate::provider::{ProviderConfig, ProviderType, QueueConfig};
use crate::providers::{AwsSqsProvider, InMemoryProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Producer/consumer contract independent of the backend
///
/// Delivery is at-least-once: a handler passed to [`Queue::consume`] can see
/// the same message more than once and must tolerate it.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Enqueue one payload; no retry is attempted on failure
    async fn produce(&self, payload: &str) -> Result<MessageId, QueueError> {
        self.produce_message(Message::new(payload)).await
    }

    /// Enqueue a message carrying attributes or a correlation id
    async fn produce_message(&self, message: Message) -> Result<MessageId, QueueError>;

    /// Start a background polling loop feeding `handler` until `shutdown` fires
    fn consume(&self, handler: Arc<dyn MessageHandler>, shutdown: CancellationToken)
        -> ConsumerHandle;

    /// Name of the bound queue
    fn queue_name(&self) -> &QueueName;
}

/// Interface implemented by specific queue backends (AWS SQS, in-memory)
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Resolve a queue name to the backend reference used by every other call
    async fn resolve_queue(&self, queue: &QueueName) -> Result<QueueUrl, QueueError>;

    /// Send single message
    async fn send_message(
        &self,
        queue: &QueueUrl,
        message: &Message,
    ) -> Result<MessageId, QueueError>;

    /// Receive at most one message, leasing it for `options.visibility_timeout`
    async fn receive_message(
        &self,
        queue: &QueueUrl,
        options: &ReceiveOptions,
    ) -> Result<Option<ReceivedMessage>, QueueError>;

    /// Acknowledge a message by deleting it with the receipt of its current lease
    async fn delete_message(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;
}

/// Result of a single poll cycle that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing was available within the wait time
    Empty,
    /// A message was handled and deleted
    Completed { message_id: MessageId },
}

/// Factory for creating queues from configuration
pub struct QueueFactory;

impl QueueFactory {
    /// Build the configured provider and resolve the configured queue
    ///
    /// Fails when the configuration is invalid or the queue cannot be resolved;
    /// no queue exists in either case.
    pub async fn create(config: &QueueConfig) -> Result<StandardQueue, QueueError> {
        config.validate()?;

        let queue_name = QueueName::new(config.queue_name.clone())?;

        let provider: Arc<dyn QueueProvider> = match &config.provider {
            ProviderConfig::AwsSqs(aws_config) => Arc::new(
                AwsSqsProvider::new(aws_config.clone()).map_err(|e| e.to_queue_error())?,
            ),
            ProviderConfig::InMemory(memory_config) => {
                Arc::new(InMemoryProvider::new(memory_config.clone()))
            }
        };

        let consumer_options = ConsumerOptions {
            error_buffer_size: config.consumer.error_buffer_size,
            error_backoff: config.consumer.error_backoff(),
        };

        Ok(
            StandardQueue::connect(provider, queue_name, config.consumer.receive_options())
                .await?
                .with_consumer_options(consumer_options),
        )
    }
}

/// Standard queue implementation: one provider, one resolved queue
///
/// Cloning is cheap; clones share the provider and the queue reference.
#[derive(Clone)]
pub struct StandardQueue {
    provider: Arc<dyn QueueProvider>,
    queue_name: QueueName,
    queue_url: QueueUrl,
    receive_options: ReceiveOptions,
    consumer_options: ConsumerOptions,
}

impl StandardQueue {
    /// Resolve `queue_name` through `provider` and bind to the result
    pub async fn connect(
        provider: Arc<dyn QueueProvider>,
        queue_name: QueueName,
        receive_options: ReceiveOptions,
    ) -> Result<Self, QueueError> {
        let queue_url = provider.resolve_queue(&queue_name).await?;

        info!(
            queue = %queue_name,
            queue_url = %queue_url,
            provider = %provider.provider_type(),
            "Resolved queue"
        );

        Ok(Self {
            provider,
            queue_name,
            queue_url,
            receive_options,
            consumer_options: ConsumerOptions::default(),
        })
    }

    /// Replace the options used by consumption loops started from this queue
    pub fn with_consumer_options(mut self, consumer_options: ConsumerOptions) -> Self {
        self.consumer_options = consumer_options;
        self
    }

    pub fn queue_url(&self) -> &QueueUrl {
        &self.queue_url
    }

    pub fn receive_options(&self) -> &ReceiveOptions {
        &self.receive_options
    }

    pub fn consumer_options(&self) -> &ConsumerOptions {
        &self.consumer_options
    }

    /// Run one poll cycle: receive, handle, delete on success
    ///
    /// A handler failure leaves the message in place; it becomes visible again
    /// once its lease runs out. A failed delete is reported but the handler's
    /// work stands, so the message may be processed again.
    pub async fn poll_once(
        &self,
        handler: &Arc<dyn MessageHandler>,
        shutdown: &CancellationToken,
    ) -> Result<PollOutcome, ConsumeError> {
        let received = self
            .provider
            .receive_message(&self.queue_url, &self.receive_options)
            .await
            .map_err(ConsumeError::Receive)?;

        let Some(message) = received else {
            return Ok(PollOutcome::Empty);
        };

        let message_id = message.message_id.clone();
        let delivery_count = message.delivery_count;

        debug!(
            queue = %self.queue_name,
            message_id = %message_id,
            delivery_count,
            "Received message"
        );

        let job = Job::from_received(&message, shutdown.clone());
        let handler = Arc::clone(handler);

        // Handler runs in its own task so a panic is reported instead of ending the loop
        let handled = tokio::spawn(async move { handler.handle(job).await })
            .await
            .unwrap_or_else(|join_error| {
                Err(anyhow::anyhow!("message handler panicked: {}", join_error))
            });

        if let Err(source) = handled {
            return Err(ConsumeError::Handler {
                message_id,
                delivery_count,
                source,
            });
        }

        if message.receipt_handle.is_expired() {
            warn!(
                queue = %self.queue_name,
                message_id = %message_id,
                "Handler outlived the visibility timeout; message may be delivered again"
            );
        }

        self.provider
            .delete_message(&self.queue_url, &message.receipt_handle)
            .await
            .map_err(|source| ConsumeError::Acknowledge {
                message_id: message_id.clone(),
                source,
            })?;

        debug!(queue = %self.queue_name, message_id = %message_id, "Deleted message");

        Ok(PollOutcome::Completed { message_id })
    }
}

impl std::fmt::Debug for StandardQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardQueue")
            .field("queue_name", &self.queue_name)
            .field("queue_url", &self.queue_url)
            .field("provider", &self.provider.provider_type())
            .field("receive_options", &self.receive_options)
            .finish()
    }
}

#[async_trait]
impl Queue for StandardQueue {
    async fn produce_message(&self, message: Message) -> Result<MessageId, QueueError> {
        let max_size = self.provider.provider_type().max_message_size();
        if message.body.len() > max_size {
            return Err(QueueError::MessageTooLarge {
                size: message.body.len(),
                max_size,
            });
        }

        let message_id = self
            .provider
            .send_message(&self.queue_url, &message)
            .await?;

        debug!(
            queue = %self.queue_name,
            message_id = %message_id,
            correlation_id = ?message.correlation_id,
            "Enqueued message"
        );

        Ok(message_id)
    }

    fn consume(
        &self,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> ConsumerHandle {
        consumer::spawn(self.clone(), handler, shutdown)
    }

    fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }
}
