//! Tests for layered configuration loading.

use super::*;
use job_queue::{InMemoryConfig, ProviderConfig};
use serial_test::serial;
use std::fs;

/// Local config path inside `dir` that does not exist
fn missing_local(dir: &tempfile::TempDir) -> String {
    dir.path().join("absent").to_string_lossy().into_owned()
}

#[test]
#[serial]
fn test_defaults_when_no_sources_exist() {
    let dir = tempfile::tempdir().unwrap();

    let config = load_from(&missing_local(&dir), None).unwrap();

    assert_eq!(config, ServiceConfig::default());
}

#[test]
#[serial]
fn test_local_file_is_picked_up() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("job-dispatch.toml"),
        "[server]\nport = 9000\n\n[queue]\nqueue_name = \"reports\"\n",
    )
    .unwrap();
    let local = dir.path().join("job-dispatch").to_string_lossy().into_owned();

    // Act
    let config = load_from(&local, None).unwrap();

    // Assert
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.queue.queue_name, "reports");
    assert_eq!(config.server.host, "0.0.0.0");
}

#[test]
#[serial]
fn test_explicit_file_overrides_local_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("job-dispatch.toml"), "[server]\nport = 9000\n").unwrap();
    let explicit = dir.path().join("override.yaml");
    fs::write(
        &explicit,
        "server:\n  port: 9100\nqueue:\n  provider:\n    type: in_memory\n    max_queue_size: 5\n",
    )
    .unwrap();
    let local = dir.path().join("job-dispatch").to_string_lossy().into_owned();

    let config = load_from(&local, Some(&explicit)).unwrap();

    assert_eq!(config.server.port, 9100);
    assert_eq!(
        config.queue.provider,
        ProviderConfig::InMemory(InMemoryConfig {
            max_queue_size: 5,
            ..InMemoryConfig::default()
        })
    );
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let explicit = dir.path().join("nope.yaml");

    let result = load_from(&missing_local(&dir), Some(&explicit));

    assert!(matches!(result, Err(SettingsError::Load(_))));
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let explicit = dir.path().join("broken.json");
    fs::write(&explicit, "{ \"server\": { \"port\": ").unwrap();

    let result = load_from(&missing_local(&dir), Some(&explicit));

    assert!(matches!(result, Err(SettingsError::Load(_))));
}

#[test]
#[serial]
fn test_environment_overrides_files() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let explicit = dir.path().join("service.yaml");
    fs::write(&explicit, "server:\n  port: 9100\n").unwrap();
    std::env::set_var("JOB_DISPATCH__SERVER__PORT", "9191");
    std::env::set_var("JOB_DISPATCH__QUEUE__QUEUE_NAME", "from-env");

    // Act
    let result = load_from(&missing_local(&dir), Some(&explicit));
    std::env::remove_var("JOB_DISPATCH__SERVER__PORT");
    std::env::remove_var("JOB_DISPATCH__QUEUE__QUEUE_NAME");

    // Assert
    let config = result.unwrap();
    assert_eq!(config.server.port, 9191);
    assert_eq!(config.queue.queue_name, "from-env");
}

#[test]
#[serial]
fn test_invalid_values_are_caught_by_validation() {
    let dir = tempfile::tempdir().unwrap();
    let explicit = dir.path().join("service.yaml");
    fs::write(&explicit, "queue:\n  consumer:\n    visibility_timeout_seconds: 0\n").unwrap();

    let config = load_from(&missing_local(&dir), Some(&explicit)).unwrap();

    assert!(config.validate().is_err());
}
