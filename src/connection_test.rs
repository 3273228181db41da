// Unit tests for connection strategy selection and backoff

use super::*;
use crate::config::AutomationConfig;
use crate::types::ConnectionStrategy;
use std::time::Duration;

/// A port with nothing listening on it
fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Config that can never reach a browser and never launches one
fn unreachable_config() -> AutomationConfig {
    AutomationConfig {
        debug_port: dead_port(),
        attach_attempts: 2,
        attach_interval: Duration::from_millis(10),
        launch_initial_delay: Duration::from_millis(10),
        launch_backoff: vec![Duration::from_millis(10)],
        launch_attempts: 2,
        browser_binary: Some("/nonexistent/path/to/browser".into()),
        ..AutomationConfig::default()
    }
}

#[tokio::test]
async fn test_pinned_attach_times_out_with_attempt_count() {
    let mut config = unreachable_config();
    config.attach_attempts = 15;
    config.attach_interval = Duration::from_millis(1);

    let manager = BrowserConnectionManager::new(config);
    let cancel = Notify::new();

    let err = manager
        .acquire(Some(ConnectionStrategy::AttachExisting), &cancel, || false)
        .await
        .unwrap_err();

    match err {
        AutomationError::ConnectionTimeout { attempts, elapsed } => {
            assert_eq!(attempts, 15);
            assert!(elapsed > Duration::ZERO);
        }
        other => panic!("expected ConnectionTimeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_pinned_strategy_has_no_fallback() {
    // With launches pointed at a nonexistent binary, a pinned
    // PersistentProfile must surface the spawn failure directly instead of
    // falling back to another strategy
    let temp = tempfile::TempDir::new().unwrap();
    let mut config = unreachable_config();
    config.browser_profile_dir = temp.path().join("profile");

    let manager = BrowserConnectionManager::new(config);
    let cancel = Notify::new();

    let err = manager
        .acquire(Some(ConnectionStrategy::PersistentProfile), &cancel, || false)
        .await
        .unwrap_err();

    assert!(
        !matches!(err, AutomationError::ConnectionTimeout { .. }),
        "spawn failure should surface directly, got {err:?}"
    );
}

#[tokio::test]
async fn test_fallback_order_exhausts_all_strategies() {
    let temp = tempfile::TempDir::new().unwrap();
    let mut config = unreachable_config();
    config.browser_profile_dir = temp.path().join("profile");

    let manager = BrowserConnectionManager::new(config);
    let cancel = Notify::new();

    // Attach fails (dead port), both launches fail (nonexistent binary);
    // the surfaced error is the last strategy's
    let err = manager.acquire(None, &cancel, || false).await.unwrap_err();
    assert!(!matches!(err, AutomationError::Cancelled));
}

#[tokio::test]
async fn test_cancellation_short_circuits_acquire() {
    let mut config = unreachable_config();
    config.attach_attempts = 1000;
    config.attach_interval = Duration::from_millis(50);

    let manager = BrowserConnectionManager::new(config);
    let cancel = Notify::new();

    let start = std::time::Instant::now();
    let err = manager
        .acquire(Some(ConnectionStrategy::AttachExisting), &cancel, || true)
        .await
        .unwrap_err();

    assert!(matches!(err, AutomationError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_launch_backoff_ladder() {
    let config = AutomationConfig {
        launch_initial_delay: Duration::from_millis(500),
        launch_backoff: vec![
            Duration::from_secs(2),
            Duration::from_secs(3),
            Duration::from_secs(5),
        ],
        ..AutomationConfig::default()
    };

    assert_eq!(config.launch_delay(1), Duration::from_millis(500));
    assert_eq!(config.launch_delay(2), Duration::from_secs(2));
    assert_eq!(config.launch_delay(3), Duration::from_secs(3));
    assert_eq!(config.launch_delay(4), Duration::from_secs(5));
    // The ladder's last rung repeats up to the attempt cap
    assert_eq!(config.launch_delay(9), Duration::from_secs(5));
}

#[test]
fn test_find_free_port_returns_bindable_port() {
    let port = find_free_port().unwrap();
    assert!(port > 0);
}
