//! Tests for signal handling.

use super::*;
use std::time::Duration;

#[tokio::test]
async fn test_listener_exits_when_token_cancelled_elsewhere() {
    let shutdown = CancellationToken::new();
    let listener = cancel_on_signal(shutdown.clone());

    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(1), listener)
        .await
        .expect("listener should exit after cancellation")
        .unwrap();
}
