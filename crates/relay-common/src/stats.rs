//! Reconciler statistics reporting seam

use std::time::Duration;

use crate::Error;

/// Reports reconciler readiness latency
///
/// Implementations record how long a resource took to become Ready after it
/// was created.
pub trait StatsReporter: Send + Sync {
    /// Record that `kind` `namespace/name` became ready after `duration`
    fn report_ready(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
        duration: Duration,
    ) -> Result<(), Error>;
}
