//! Test log setup
//!
//! Reconcilers log through `tracing`; tests call [`init_test_logging`] to see
//! that output interleaved with the test harness's own capture.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_TEST_FILTER: &str = "debug,kube=info,hyper=warn";

/// Install a subscriber that writes through libtest's captured output
///
/// Safe to call from every test; only the first call in a process installs
/// anything.
pub fn init_test_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_test_writer()
        .with_target(true)
        .with_line_number(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_test_logging();
        init_test_logging();
        let span = tracing::info_span!("relay_test");
        let _guard = span.enter();
        tracing::debug!("logging initialized twice without panicking");
    }
}
