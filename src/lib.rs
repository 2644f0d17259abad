//! lb-telemetry Library
//!
//! Metrics reporting for a layer-4 load balancer: a gauge registry exposed in
//! Prometheus text format, the reporter the balancer core calls into, and the
//! management API that serves server snapshots.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod telemetry;

// Re-export commonly used types
pub use adapters::inbound::{ApiServer, MetricsServer};
pub use adapters::outbound::{DashMapServerCatalog, MetricsReporter};
pub use config::{load_config, Config};
pub use domain::entities::{Backend, BackendStats, BackendsByTarget, BandwidthStats, Server};
pub use domain::ports::{ServerCatalog, StatsReporter};
pub use domain::value_objects::Target;
pub use infrastructure::ShutdownController;
pub use telemetry::{TelemetryError, TelemetryRegistry};
