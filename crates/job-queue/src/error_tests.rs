//! Tests for error types.

use super::*;

#[test]
fn test_error_transience() {
    assert!(QueueError::ConnectionFailed {
        message: "network error".to_string(),
    }
    .is_transient());

    assert!(QueueError::ProviderError {
        provider: "AwsSqs".to_string(),
        code: "ThrottlingException".to_string(),
        message: "slow down".to_string(),
    }
    .is_transient());

    assert!(!QueueError::QueueNotFound {
        queue_name: "test".to_string(),
    }
    .is_transient());

    assert!(!QueueError::AuthenticationFailed {
        message: "bad key".to_string(),
    }
    .is_transient());

    assert!(!QueueError::MessageTooLarge {
        size: 1000,
        max_size: 500
    }
    .is_transient());
}

#[test]
fn test_retry_suggestions() {
    let connection = QueueError::ConnectionFailed {
        message: "refused".to_string(),
    };
    assert_eq!(connection.retry_after(), Some(Duration::seconds(5)));

    let not_found = QueueError::QueueNotFound {
        queue_name: "test".to_string(),
    };
    assert_eq!(not_found.retry_after(), None);
}

#[test]
fn test_rejected_request_is_permanent() {
    let rejected = QueueError::RequestRejected {
        provider: "AwsSqs".to_string(),
        code: "InvalidParameterValue".to_string(),
        message: "bad value".to_string(),
    };

    assert!(!rejected.is_transient());
    assert_eq!(rejected.retry_after(), None);
}

#[test]
fn test_nested_errors_convert_into_queue_error() {
    let error: QueueError = ValidationError::Required {
        field: "queue_name".to_string(),
    }
    .into();
    assert!(matches!(error, QueueError::ValidationError(_)));
    assert!(error.to_string().contains("queue_name"));

    let error: QueueError = SerializationError::MissingElement {
        element: "QueueUrl".to_string(),
    }
    .into();
    assert!(!error.is_transient());
}
