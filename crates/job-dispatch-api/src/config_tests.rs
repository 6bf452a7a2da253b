//! Tests for service configuration.

use super::*;
use job_queue::{InMemoryConfig, ProviderConfig};

#[test]
fn test_defaults_are_valid() {
    let config = ServiceConfig::default();

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.queue.queue_name, "jobs");
    assert_eq!(config.logging.level, "info");
    assert!(!config.logging.json_format);
    assert!(config.validate().is_ok());
}

#[test]
fn test_socket_addr() {
    let server = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 9090,
        ..ServerConfig::default()
    };
    assert_eq!(server.socket_addr().unwrap().to_string(), "127.0.0.1:9090");

    let invalid = ServerConfig {
        host: "not a host".to_string(),
        ..ServerConfig::default()
    };
    assert!(matches!(invalid.validate(), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_zero_body_limit_rejected() {
    let server = ServerConfig {
        max_body_size: 0,
        ..ServerConfig::default()
    };
    assert!(server.validate().is_err());
}

#[test]
fn test_logging_level_validation() {
    let valid = LoggingConfig {
        level: "DEBUG".to_string(),
        ..LoggingConfig::default()
    };
    assert!(valid.validate().is_ok());

    let invalid = LoggingConfig {
        level: "verbose".to_string(),
        ..LoggingConfig::default()
    };
    let error = invalid.validate().unwrap_err();
    assert!(error.to_string().contains("verbose"));
}

#[test]
fn test_queue_errors_surface_as_config_errors() {
    let mut config = ServiceConfig::default();
    config.queue.queue_name = "bad name!".to_string();

    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_partial_json_uses_defaults() {
    let json = serde_json::json!({
        "server": { "port": 3000 },
        "queue": { "provider": { "type": "in_memory" } }
    });

    let config: ServiceConfig = serde_json::from_value(json).unwrap();

    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(
        config.queue.provider,
        ProviderConfig::InMemory(InMemoryConfig::default())
    );
    assert_eq!(config.logging, LoggingConfig::default());
}
