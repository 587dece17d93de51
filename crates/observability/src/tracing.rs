//! Tracing/logging initialization.
//!
//! Logs are JSON lines on stdout. `RUST_LOG` overrides the default `info`
//! filter, e.g. `RUST_LOG=coffer_infra=debug,info`.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Build the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global JSON subscriber.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    // Span fields (e.g. `transfer_id`) are carried on every event inside the span.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// Install a plain-text subscriber that writes through the test harness.
///
/// Used by tests that want log output on failure; a no-op once any
/// subscriber is installed.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init();
}
