//! Logging initialisation.

use job_dispatch_api::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;

/// Crates whose events are emitted at the configured level
const CRATES: [&str; 3] = ["job_dispatch_service", "job_dispatch_api", "job_queue"];

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("Global subscriber already installed: {message}")]
    AlreadyInitialized { message: String },
}

/// Default filter directives for `level`
///
/// Request tracing from `tower_http` follows the same level.
pub fn default_directives(level: &str) -> String {
    let level = level.to_ascii_lowercase();
    CRATES
        .iter()
        .chain(std::iter::once(&"tower_http"))
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Build the event filter; `RUST_LOG` takes precedence over the configured level
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directives = default_directives(&config.level);
    EnvFilter::try_new(&directives).map_err(|e| TelemetryError::InvalidFilter {
        filter: directives,
        message: e.to_string(),
    })
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| TelemetryError::AlreadyInitialized {
        message: e.to_string(),
    })
}
