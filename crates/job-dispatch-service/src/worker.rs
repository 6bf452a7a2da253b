//! Worker supervisor: runs the consumption loop and reports its errors.

use async_trait::async_trait;
use job_queue::{ConsumeError, ConsumerStats, Job, MessageHandler, Queue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

/// Supervises one consumption loop over a queue
pub struct Worker {
    queue: Arc<dyn Queue>,
    handler: Arc<dyn MessageHandler>,
}

impl Worker {
    pub fn new(queue: Arc<dyn Queue>, handler: Arc<dyn MessageHandler>) -> Self {
        Self { queue, handler }
    }

    /// Consume until `shutdown` fires
    ///
    /// Every error the loop reports is logged. Returns once the loop has
    /// finished its last cycle, including a handler that was in flight when
    /// shutdown started.
    pub async fn run(&self, shutdown: CancellationToken) -> ConsumerStats {
        info!(queue = %self.queue.queue_name(), "Worker started");

        let mut consumer = self.queue.consume(self.handler.clone(), shutdown);

        // The stream closes when the loop exits.
        while let Some(error) = consumer.next_error().await {
            log_consume_error(&error);
        }

        let stats = match consumer.join().await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Consumption loop terminated abnormally");
                ConsumerStats::default()
            }
        };

        info!(
            queue = %self.queue.queue_name(),
            completed = stats.completed,
            failed = stats.failed,
            dropped_errors = stats.dropped_errors,
            "Worker stopped"
        );

        stats
    }
}

fn log_consume_error(error: &ConsumeError) {
    let message_id = error
        .message_id()
        .map(|id| id.to_string())
        .unwrap_or_default();

    if error.is_transient() {
        warn!(error = %error, message_id = %message_id, "Failed to consume message");
    } else {
        error!(error = %error, message_id = %message_id, "Failed to consume message");
    }
}

/// Default job handler: logs each processed payload
#[derive(Debug, Default, Clone, Copy)]
pub struct LogJobHandler;

#[async_trait]
impl MessageHandler for LogJobHandler {
    async fn handle(&self, job: Job) -> anyhow::Result<()> {
        info!(
            message_id = %job.message_id(),
            correlation_id = job.correlation_id().unwrap_or("-"),
            delivery_count = job.delivery_count(),
            payload = %job.payload(),
            "Worker has processed the job"
        );
        Ok(())
    }
}
