//! Cancellable consumption loop and the handler contract it drives.
//!
//! The loop processes one message at a time: receive, handle, delete on
//! success. Failures never stop it; they are pushed onto a bounded error
//! stream that a supervisor drains through [`ConsumerHandle`]. When nobody
//! keeps up with that stream, errors are logged and dropped rather than
//! blocking the loop.

use crate::client::{PollOutcome, StandardQueue};
use crate::error::QueueError;
use crate::message::{MessageId, ReceivedMessage, Timestamp};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;

/// Default capacity of the error stream
pub const DEFAULT_ERROR_BUFFER_SIZE: usize = 64;

// ============================================================================
// Handler Contract
// ============================================================================

/// A received message as seen by a handler
#[derive(Debug, Clone)]
pub struct Job {
    payload: String,
    message_id: MessageId,
    correlation_id: Option<String>,
    delivery_count: u32,
    lease_expires_at: Timestamp,
    shutdown: CancellationToken,
}

impl Job {
    pub fn new(
        payload: impl Into<String>,
        message_id: MessageId,
        delivery_count: u32,
        lease_expires_at: Timestamp,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            payload: payload.into(),
            message_id,
            correlation_id: None,
            delivery_count,
            lease_expires_at,
            shutdown,
        }
    }

    pub(crate) fn from_received(message: &ReceivedMessage, shutdown: CancellationToken) -> Self {
        let job = Self::new(
            message.body.clone(),
            message.message_id.clone(),
            message.delivery_count,
            message.receipt_handle.expires_at().clone(),
            shutdown,
        );
        match &message.correlation_id {
            Some(correlation_id) => job.with_correlation_id(correlation_id.clone()),
            None => job,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn into_payload(self) -> String {
        self.payload
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Id of the request that produced this job, when the producer set one
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Number of times this message has been delivered, starting at 1
    pub fn delivery_count(&self) -> u32 {
        self.delivery_count
    }

    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }

    /// Instant after which the message may be handed to another consumer
    pub fn lease_expires_at(&self) -> &Timestamp {
        &self.lease_expires_at
    }

    /// Fires when the owning consumer is asked to stop
    ///
    /// The loop never interrupts a running handler; long handlers may watch
    /// this token to finish early.
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }
}

/// Processes one job per call
///
/// Delivery is at-least-once, so implementations must tolerate seeing the
/// same message again. Returning `Err` leaves the message on the queue to be
/// redelivered after its visibility timeout.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, job: Job) -> anyhow::Result<()>;
}

/// [`MessageHandler`] backed by an async closure, see [`handler_fn`]
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a [`MessageHandler`]
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, job: Job) -> anyhow::Result<()> {
        (self.f)(job).await
    }
}

// ============================================================================
// Errors and Statistics
// ============================================================================

/// Failure of a single poll cycle; the loop keeps running after each one
#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    #[error("Failed to receive message: {0}")]
    Receive(#[source] QueueError),

    #[error("Handler failed for message {message_id} (delivery {delivery_count}): {source}")]
    Handler {
        message_id: MessageId,
        delivery_count: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to delete message {message_id}: {source}")]
    Acknowledge {
        message_id: MessageId,
        #[source]
        source: QueueError,
    },
}

impl ConsumeError {
    /// Message the failure relates to, if one was received
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::Receive(_) => None,
            Self::Handler { message_id, .. } | Self::Acknowledge { message_id, .. } => {
                Some(message_id)
            }
        }
    }

    /// Whether the backend failure is expected to clear up by itself
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Receive(error) | Self::Acknowledge { source: error, .. } => error.is_transient(),
            Self::Handler { .. } => false,
        }
    }
}

/// Counters collected by a consumption loop over its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub cycles: u64,
    pub empty_polls: u64,
    pub completed: u64,
    pub failed: u64,
    /// Errors not delivered because the stream was full or unread
    pub dropped_errors: u64,
}

/// Tuning for a consumption loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerOptions {
    /// Capacity of the error stream
    pub error_buffer_size: usize,
    /// Cancellable pause after a failed cycle
    pub error_backoff: Option<std::time::Duration>,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            error_buffer_size: DEFAULT_ERROR_BUFFER_SIZE,
            error_backoff: None,
        }
    }
}

// ============================================================================
// Consumer Handle and Loop
// ============================================================================

/// Owner's side of a running consumption loop
///
/// Dropping the handle neither stops the loop nor blocks it; call
/// [`ConsumerHandle::cancel`] or cancel the token passed to `consume`.
pub struct ConsumerHandle {
    errors: mpsc::Receiver<ConsumeError>,
    shutdown: CancellationToken,
    task: JoinHandle<ConsumerStats>,
}

impl ConsumerHandle {
    /// Next reported error; `None` once the loop has exited and the stream is drained
    pub async fn next_error(&mut self) -> Option<ConsumeError> {
        self.errors.recv().await
    }

    /// Next buffered error without waiting
    pub fn try_next_error(&mut self) -> Option<ConsumeError> {
        self.errors.try_recv().ok()
    }

    /// Ask the loop to stop after the cycle in progress
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit and collect its statistics
    pub async fn join(self) -> Result<ConsumerStats, JoinError> {
        self.task.await
    }

    /// Cancel, then wait for the loop to exit
    pub async fn shutdown(self) -> Result<ConsumerStats, JoinError> {
        self.cancel();
        self.join().await
    }
}

impl std::fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("cancelled", &self.shutdown.is_cancelled())
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

/// Start the consumption loop for `queue` on a new task
pub(crate) fn spawn(
    queue: StandardQueue,
    handler: Arc<dyn MessageHandler>,
    shutdown: CancellationToken,
) -> ConsumerHandle {
    let options = queue.consumer_options().clone();
    let (errors_tx, errors_rx) = mpsc::channel(options.error_buffer_size.max(1));

    let task = tokio::spawn(run(
        queue,
        handler,
        shutdown.clone(),
        errors_tx,
        options.error_backoff,
    ));

    ConsumerHandle {
        errors: errors_rx,
        shutdown,
        task,
    }
}

async fn run(
    queue: StandardQueue,
    handler: Arc<dyn MessageHandler>,
    shutdown: CancellationToken,
    errors: mpsc::Sender<ConsumeError>,
    error_backoff: Option<std::time::Duration>,
) -> ConsumerStats {
    use crate::client::Queue;

    let mut stats = ConsumerStats::default();
    info!(queue = %queue.queue_name(), "Consumer started");

    // Checked once per cycle; a receive or handler in flight always completes
    while !shutdown.is_cancelled() {
        stats.cycles += 1;

        match queue.poll_once(&handler, &shutdown).await {
            Ok(PollOutcome::Empty) => stats.empty_polls += 1,
            Ok(PollOutcome::Completed { message_id }) => {
                stats.completed += 1;
                debug!(message_id = %message_id, "Completed message");
            }
            Err(error) => {
                stats.failed += 1;
                report(&errors, error, &mut stats);

                if let Some(backoff) = error_backoff {
                    tokio::select! {
                        _ = shutdown.cancelled() => {}
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        // An always-ready backend must not starve other tasks on the runtime
        tokio::task::yield_now().await;
    }

    info!(
        queue = %queue.queue_name(),
        cycles = stats.cycles,
        completed = stats.completed,
        failed = stats.failed,
        dropped_errors = stats.dropped_errors,
        "Consumer stopped"
    );

    stats
}

/// Push `error` onto the stream without waiting for the reader
fn report(errors: &mpsc::Sender<ConsumeError>, error: ConsumeError, stats: &mut ConsumerStats) {
    match errors.try_send(error) {
        Ok(()) => {}
        Err(TrySendError::Full(error)) => {
            stats.dropped_errors += 1;
            warn!(error = %error, "Error stream full, dropping error");
        }
        Err(TrySendError::Closed(error)) => {
            stats.dropped_errors += 1;
            warn!(error = %error, "Error stream closed, dropping error");
        }
    }
}
