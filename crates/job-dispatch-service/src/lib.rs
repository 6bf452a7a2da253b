//! # Job Dispatch Service
//!
//! Process bootstrap for the job dispatch pipeline. One binary runs either
//! side of the queue:
//! - `--type api` serves `POST /jobs` and enqueues each job
//! - `--type worker` consumes jobs until SIGINT or SIGTERM
//!
//! Both sides share the configuration described in [`settings`].

pub mod settings;
pub mod shutdown;
pub mod telemetry;
pub mod worker;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

pub use settings::SettingsError;
pub use telemetry::TelemetryError;
pub use worker::{LogJobHandler, Worker};

use clap::{Parser, ValueEnum};
use job_dispatch_api::{start_server, ServiceConfig, ServiceError};
use job_queue::{QueueError, QueueFactory};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

// ============================================================================
// CLI Structure
// ============================================================================

/// Job dispatch - enqueue jobs over HTTP and process them from a queue
#[derive(Debug, Parser)]
#[command(name = "job-dispatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Enqueue jobs over HTTP and process them from a queue")]
pub struct Cli {
    /// Which side of the queue this process runs
    #[arg(short = 't', long = "type", value_enum, default_value_t = ProcessType::Worker)]
    pub process_type: ProcessType,

    /// Configuration file path
    #[arg(short, long, env = "JOB_DISPATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level, overrides `logging.level`
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,
}

/// Process role
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProcessType {
    /// HTTP producer endpoint
    Api,
    /// Queue consumer
    Worker,
}

impl std::fmt::Display for ProcessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api => write!(f, "api"),
            Self::Worker => write!(f, "worker"),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Fatal errors of the process, each with its own exit code
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] SettingsError),

    #[error("Failed to construct queue: {0}")]
    QueueConstruction(#[source] QueueError),

    #[error("Server error: {0}")]
    Server(#[from] ServiceError),

    #[error("Logging error: {0}")]
    Logging(#[from] TelemetryError),
}

impl DispatchError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::QueueConstruction(_) => 2,
            Self::Server(_) => 3,
            Self::Logging(_) => 4,
        }
    }
}

// ============================================================================
// Entry Point
// ============================================================================

/// Resolve the effective configuration: sources first, then command-line overrides
pub fn resolve_config(cli: &Cli) -> Result<ServiceConfig, SettingsError> {
    let mut config = settings::load(cli.config.as_deref())?;

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.json_format = true;
    }

    config.validate()?;
    Ok(config)
}

/// Run the process until it is told to stop
pub async fn run(cli: Cli) -> Result<(), DispatchError> {
    let config = resolve_config(&cli)?;
    telemetry::init(&config.logging)?;

    info!(
        process_type = %cli.process_type,
        queue = %config.queue.queue_name,
        provider = %config.queue.provider.provider_type(),
        "Starting job dispatch"
    );

    let queue = QueueFactory::create(&config.queue).await.map_err(|e| {
        error!(error = %e, queue = %config.queue.queue_name, "Failed to construct queue");
        DispatchError::QueueConstruction(e)
    })?;
    let queue = Arc::new(queue);

    let shutdown = CancellationToken::new();
    let signals = shutdown::cancel_on_signal(shutdown.clone());

    let result = match cli.process_type {
        ProcessType::Api => start_server(config.server, queue, shutdown.clone())
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP API server failed");
                DispatchError::from(e)
            }),
        ProcessType::Worker => {
            Worker::new(queue, Arc::new(LogJobHandler))
                .run(shutdown.clone())
                .await;
            Ok(())
        }
    };

    shutdown.cancel();
    let _ = signals.await;

    info!("Job dispatch stopped");
    result
}
