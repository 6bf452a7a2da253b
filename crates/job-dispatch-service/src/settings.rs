//! Layered configuration loading.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults carried by [`ServiceConfig`]
//! 2. `config/job-dispatch.{yaml,toml,json}` relative to the working directory, if present
//! 3. An explicit file (`--config` / `JOB_DISPATCH_CONFIG`), which must exist
//! 4. Environment variables prefixed `JOB_DISPATCH__`, nested with `__`,
//!    e.g. `JOB_DISPATCH__SERVER__PORT=9090` sets `server.port`

use job_dispatch_api::{ConfigError, ServiceConfig};
use std::path::Path;
use tracing::debug;

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "JOB_DISPATCH";

/// Optional deployment-local configuration file, without extension
pub const LOCAL_CONFIG_FILE: &str = "config/job-dispatch";

/// Errors raised while assembling the service configuration
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// A source could not be read, parsed or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The merged configuration does not validate
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Load the service configuration from all sources
///
/// The result is not validated; callers apply command-line overrides first
/// and then call [`ServiceConfig::validate`].
pub fn load(explicit_file: Option<&Path>) -> Result<ServiceConfig, SettingsError> {
    load_from(LOCAL_CONFIG_FILE, explicit_file)
}

fn load_from(local_file: &str, explicit_file: Option<&Path>) -> Result<ServiceConfig, SettingsError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name(local_file).required(false));

    if let Some(path) = explicit_file {
        debug!(path = %path.display(), "Loading configuration from explicit path");
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
