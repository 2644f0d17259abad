//! Stats Reporter Port
//!
//! Defines the interface the balancing core uses to publish state changes.

use crate::domain::entities::{BackendsByTarget, BandwidthStats};
use crate::domain::value_objects::Target;

/// Sink for balancer state-change events.
///
/// This is an outbound port. The balancing core calls it on every relevant
/// change, from any task, without checking whether reporting is enabled.
/// Implementations must never block or fail.
pub trait StatsReporter: Send + Sync {
    /// A backend was marked live or dead by the health checker.
    fn report_liveness_change(&self, server: &str, target: &Target, live: bool);

    /// The number of active connections on a server changed.
    fn report_connection_count_change(&self, server: &str, active_connections: u64);

    /// A new bandwidth sample is available for a server.
    fn report_bandwidth_sample(&self, server: &str, stats: &BandwidthStats);

    /// Traffic counters of one backend changed.
    ///
    /// `backends` is the server's full backend snapshot; only `target` is reported.
    fn report_backend_aggregate_stats(
        &self,
        server: &str,
        target: &Target,
        backends: &BackendsByTarget,
    );

    /// Connection counters of one backend changed after an operation.
    fn report_backend_operation_stats(
        &self,
        server: &str,
        target: &Target,
        backends: &BackendsByTarget,
    );
}
