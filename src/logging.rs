//! Logging utilities for structured tracing

use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "slackv=info";

/// Install the global tracing subscriber.
///
/// Logs go to stderr so they never interleave with the transcript on stdout.
/// Set `SLACKV_LOG_FORMAT=json` for machine-readable output.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("SLACKV_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Measures one remote call and logs its duration when dropped.
///
/// Calls slower than the optional threshold are logged at warn so a
/// struggling API shows up without debug logging enabled.
pub struct Timer {
    start: Instant,
    operation: String,
    slow_after: Option<Duration>,
}

impl Timer {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.into(),
            slow_after: None,
        }
    }

    pub fn slow_after(mut self, threshold: Duration) -> Self {
        self.slow_after = Some(threshold);
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn is_slow(&self) -> bool {
        self.slow_after.is_some_and(|t| self.elapsed() > t)
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration_ms = self.elapsed().as_millis() as u64;
        if self.is_slow() {
            tracing::warn!(operation = %self.operation, duration_ms, "Slow Slack API call");
        } else {
            tracing::debug!(operation = %self.operation, duration_ms, "Slack API call completed");
        }
    }
}

/// Log an error with structured context
pub fn log_error(operation: &str, error: &impl std::error::Error) {
    tracing::error!(
        operation = %operation,
        error = %error,
        error_kind = std::any::type_name_of_val(error),
        "Operation failed"
    );
}
