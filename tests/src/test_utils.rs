//! Test utility functions for integration tests
//!
//! Provides common utilities for test setup, logging, and waiting.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing_subscriber::{fmt, EnvFilter};

/// Result type for integration tests
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Initialize logging for tests
///
/// Uses RUST_LOG environment variable if set, otherwise defaults to "warn"
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
}

/// Wait for a condition to become true with timeout
///
/// # Returns
/// * `Ok(())` if condition became true within timeout
/// * `Err` if timeout elapsed
pub async fn wait_for_condition<F, Fut>(
    mut condition: F,
    timeout_duration: Duration,
    poll_interval: Duration,
) -> TestResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = timeout(timeout_duration, async {
        loop {
            if condition().await {
                return;
            }
            sleep(poll_interval).await;
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => Err("Condition not met within timeout".into()),
    }
}

/// Default timeout for test operations
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default poll interval for condition checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);
