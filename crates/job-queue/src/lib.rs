//! # Job Queue
//!
//! Queue abstraction and consumption loop for at-least-once job processing.
//!
//! This library provides:
//! - A backend-agnostic [`Queue`] contract for producing and consuming messages
//! - Backends for AWS SQS (query API over HTTP) and an in-memory queue
//! - A cancellable single-message polling loop that acknowledges by deleting
//!   a message only after its handler succeeds
//! - A bounded, non-blocking error stream for supervising the loop
//!
//! ## Delivery semantics
//!
//! Every received message is leased for the configured visibility timeout.
//! A handler that fails, or outlives the lease, leaves the message to be
//! delivered again. Handlers must therefore be idempotent.
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Message structures and receipt handles
//! - [`provider`] - Provider types and configuration
//! - [`client`] - Queue contracts and the standard adapter
//! - [`consumer`] - Handler contract and consumption loop
//! - [`providers`] - Backend implementations

pub mod client;
pub mod consumer;
pub mod error;
pub mod message;
pub mod provider;
pub mod providers;

// Re-export commonly used types at crate root for convenience
pub use client::{PollOutcome, Queue, QueueFactory, QueueProvider, StandardQueue};
pub use consumer::{
    handler_fn, ConsumeError, ConsumerHandle, ConsumerOptions, ConsumerStats, FnHandler, Job,
    MessageHandler,
};
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use message::{
    Message, MessageId, QueueName, QueueUrl, ReceiptHandle, ReceiveOptions, ReceivedMessage,
    Timestamp,
};
pub use provider::{
    AwsSqsConfig, ConsumerConfig, InMemoryConfig, ProviderConfig, ProviderType, QueueConfig,
};
pub use providers::{AwsSqsProvider, InMemoryProvider, QueueDepth};

// Token accepted by `Queue::consume`
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
