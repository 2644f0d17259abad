//! Metrics Reporter
//!
//! Implements StatsReporter on top of the telemetry registry.

use crate::domain::entities::{BackendStats, BackendsByTarget, BandwidthStats};
use crate::domain::ports::StatsReporter;
use crate::domain::value_objects::Target;
use crate::telemetry::TelemetryRegistry;
use std::borrow::Cow;
use std::sync::Arc;

/// Gauge-backed stats reporter.
///
/// Every call checks the registry state once and returns immediately while
/// reporting is disabled, so the balancing core can call it unconditionally.
/// Clones share the same registry.
#[derive(Clone)]
pub struct MetricsReporter {
    registry: Arc<TelemetryRegistry>,
}

impl MetricsReporter {
    pub fn new(registry: Arc<TelemetryRegistry>) -> Self {
        Self { registry }
    }

    /// Reporter over a registry that is never initialized.
    pub fn disabled() -> Self {
        Self::new(Arc::new(TelemetryRegistry::disabled()))
    }

    pub fn registry(&self) -> &Arc<TelemetryRegistry> {
        &self.registry
    }

    pub fn is_enabled(&self) -> bool {
        self.registry.is_enabled()
    }
}

/// Stats of `target` in the snapshot, zeroed if the snapshot lacks it.
fn stats_for<'a>(
    server: &str,
    target: &Target,
    backends: &'a BackendsByTarget,
) -> Cow<'a, BackendStats> {
    match backends.get(target) {
        Some(backend) => Cow::Borrowed(&backend.stats),
        None => {
            tracing::warn!(
                "backend {} missing from snapshot of server {}, reporting zero",
                target,
                server
            );
            Cow::Owned(BackendStats::default())
        }
    }
}

impl StatsReporter for MetricsReporter {
    fn report_liveness_change(&self, server: &str, target: &Target, live: bool) {
        let Some(series) = self.registry.series() else {
            return;
        };

        let [host, port] = target.labels();
        let value = if live { 1.0 } else { 0.0 };
        series.backend_live.set([server, host, port], value);
    }

    fn report_connection_count_change(&self, server: &str, active_connections: u64) {
        let Some(series) = self.registry.series() else {
            return;
        };

        series
            .server_active_connections
            .set([server], active_connections as f64);
    }

    fn report_bandwidth_sample(&self, server: &str, stats: &BandwidthStats) {
        let Some(series) = self.registry.series() else {
            return;
        };

        series.server_rx_total.set([server], stats.rx_total as f64);
        series.server_tx_total.set([server], stats.tx_total as f64);
        series.server_rx_second.set([server], stats.rx_second as f64);
        series.server_tx_second.set([server], stats.tx_second as f64);
    }

    fn report_backend_aggregate_stats(
        &self,
        server: &str,
        target: &Target,
        backends: &BackendsByTarget,
    ) {
        let Some(series) = self.registry.series() else {
            return;
        };

        let stats = stats_for(server, target, backends);
        let [host, port] = target.labels();
        let labels = [server, host, port];

        series.server_count.set([server], backends.len() as f64);

        series.backend_rx_bytes.set(labels, stats.rx_bytes as f64);
        series.backend_tx_bytes.set(labels, stats.tx_bytes as f64);
        series.backend_rx_second.set(labels, stats.rx_second as f64);
        series.backend_tx_second.set(labels, stats.tx_second as f64);
    }

    fn report_backend_operation_stats(
        &self,
        server: &str,
        target: &Target,
        backends: &BackendsByTarget,
    ) {
        let Some(series) = self.registry.series() else {
            return;
        };

        let stats = stats_for(server, target, backends);
        let [host, port] = target.labels();
        let labels = [server, host, port];

        series
            .backend_active_connections
            .set(labels, stats.active_connections as f64);
        series
            .backend_refused_connections
            .set(labels, stats.refused_connections as f64);
        series
            .backend_total_connections
            .set(labels, stats.total_connections as f64);
    }
}
