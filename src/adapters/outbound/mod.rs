mod dashmap_server_catalog;
mod metrics_reporter;

pub use dashmap_server_catalog::DashMapServerCatalog;
pub use metrics_reporter::MetricsReporter;
