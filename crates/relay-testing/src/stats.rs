//! Stats reporter stand-in

use std::time::Duration;

use relay_common::stats::StatsReporter;
use relay_common::Error;

/// [`StatsReporter`] that accepts and discards every report
///
/// The harness hands one out with each assembly but does not pass it to the
/// reconciler.
#[derive(Clone, Copy, Debug, Default)]
pub struct FakeStatsReporter;

impl StatsReporter for FakeStatsReporter {
    fn report_ready(
        &self,
        _kind: &str,
        _namespace: &str,
        _name: &str,
        _duration: Duration,
    ) -> Result<(), Error> {
        Ok(())
    }
}
