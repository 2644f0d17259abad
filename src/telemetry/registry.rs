//! Telemetry Registry
//!
//! Owns the fixed set of gauge series published for scraping. A registry
//! starts disabled; `initialize` defines and registers every series exactly
//! once. While disabled the registry holds no series and renders nothing.

use crate::telemetry::gauge::{is_valid_name, Family, GaugeVec};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Default prefix for every series name.
pub const DEFAULT_NAMESPACE: &str = "lb";

const SERVER_LABELS: [&str; 1] = ["server"];
const BACKEND_LABELS: [&str; 3] = ["server", "host", "port"];

/// Gauge labeled by server name.
pub type ServerGauge = GaugeVec<1>;
/// Gauge labeled by server name, backend host and backend port.
pub type BackendGauge = GaugeVec<3>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("telemetry registry already initialized")]
    AlreadyInitialized,

    #[error("invalid metric name: {0:?}")]
    InvalidName(String),

    #[error("series {0} registered twice")]
    DuplicateSeries(String),
}

/// Ordered list of families rendered on scrape.
#[derive(Default)]
pub struct Exposition {
    families: Vec<Arc<dyn Family>>,
}

impl Exposition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a family. Names must be valid and unique.
    pub fn register(&mut self, family: Arc<dyn Family>) -> Result<(), TelemetryError> {
        let name = family.name();
        if !is_valid_name(name) {
            return Err(TelemetryError::InvalidName(name.to_string()));
        }
        if self.families.iter().any(|f| f.name() == name) {
            return Err(TelemetryError::DuplicateSeries(name.to_string()));
        }
        self.families.push(family);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.families.iter().map(|f| f.name()).collect()
    }

    /// Label combinations holding a value, across all families.
    pub fn series_count(&self) -> usize {
        self.families.iter().map(|f| f.series_count()).sum()
    }

    /// Render every family in registration order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for family in &self.families {
            family.render(&mut out);
        }
        out
    }
}

/// Every series published by the balancer, plus their registration.
pub struct Series {
    pub server_count: Arc<ServerGauge>,
    pub server_active_connections: Arc<ServerGauge>,
    pub server_rx_total: Arc<ServerGauge>,
    pub server_tx_total: Arc<ServerGauge>,
    pub server_rx_second: Arc<ServerGauge>,
    pub server_tx_second: Arc<ServerGauge>,

    pub backend_active_connections: Arc<BackendGauge>,
    pub backend_refused_connections: Arc<BackendGauge>,
    pub backend_total_connections: Arc<BackendGauge>,
    pub backend_rx_bytes: Arc<BackendGauge>,
    pub backend_tx_bytes: Arc<BackendGauge>,
    pub backend_rx_second: Arc<BackendGauge>,
    pub backend_tx_second: Arc<BackendGauge>,
    pub backend_live: Arc<BackendGauge>,

    exposition: Exposition,
}

impl Series {
    /// Define every series under `namespace` and register them in order.
    pub fn define(namespace: &str) -> Result<Self, TelemetryError> {
        let name = |subsystem: &str, metric: &str| {
            if namespace.is_empty() {
                format!("{}_{}", subsystem, metric)
            } else {
                format!("{}_{}_{}", namespace, subsystem, metric)
            }
        };
        let server = |metric: &str, help: &'static str| {
            Arc::new(ServerGauge::new(name("server", metric), help, SERVER_LABELS))
        };
        let backend = |metric: &str, help: &'static str| {
            Arc::new(BackendGauge::new(name("backend", metric), help, BACKEND_LABELS))
        };

        let mut series = Self {
            server_count: server("count", "Number of backends known for the server."),
            server_active_connections: server(
                "active_connections",
                "Active connections on the server.",
            ),
            server_rx_total: server("rx_total", "Bytes received by the server."),
            server_tx_total: server("tx_total", "Bytes sent by the server."),
            server_rx_second: server("rx_second", "Bytes received by the server per second."),
            server_tx_second: server("tx_second", "Bytes sent by the server per second."),

            backend_active_connections: backend(
                "active_connections",
                "Active connections to the backend.",
            ),
            backend_refused_connections: backend(
                "refused_connections",
                "Connections refused by the backend.",
            ),
            backend_total_connections: backend(
                "total_connections",
                "Connections ever made to the backend.",
            ),
            backend_rx_bytes: backend("rx_bytes", "Bytes received from the backend."),
            backend_tx_bytes: backend("tx_bytes", "Bytes sent to the backend."),
            backend_rx_second: backend("rx_second", "Bytes received from the backend per second."),
            backend_tx_second: backend("tx_second", "Bytes sent to the backend per second."),
            backend_live: backend("live", "Whether the backend is live (1) or not (0)."),

            exposition: Exposition::new(),
        };

        let families: Vec<Arc<dyn Family>> = vec![
            series.server_count.clone(),
            series.server_active_connections.clone(),
            series.server_rx_total.clone(),
            series.server_tx_total.clone(),
            series.server_rx_second.clone(),
            series.server_tx_second.clone(),
            series.backend_active_connections.clone(),
            series.backend_refused_connections.clone(),
            series.backend_total_connections.clone(),
            series.backend_rx_bytes.clone(),
            series.backend_tx_bytes.clone(),
            series.backend_rx_second.clone(),
            series.backend_tx_second.clone(),
            series.backend_live.clone(),
        ];
        for family in families {
            series.exposition.register(family)?;
        }

        Ok(series)
    }

    pub fn exposition(&self) -> &Exposition {
        &self.exposition
    }
}

/// Process-wide holder of the reporting state.
///
/// Construct once at startup, wrap in an `Arc` and hand it to the reporter and
/// the exporter endpoint.
pub struct TelemetryRegistry {
    namespace: String,
    series: OnceLock<Series>,
}

impl TelemetryRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            series: OnceLock::new(),
        }
    }

    /// A registry that stays disabled unless `initialize` is called.
    pub fn disabled() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }

    /// Build and register every series, enabling reporting.
    ///
    /// Must be called at most once; later calls return `AlreadyInitialized`
    /// and leave the existing series untouched.
    pub fn initialize(&self) -> Result<&Series, TelemetryError> {
        if self.series.get().is_some() {
            return Err(TelemetryError::AlreadyInitialized);
        }
        let series = Series::define(&self.namespace)?;
        self.series
            .set(series)
            .map_err(|_| TelemetryError::AlreadyInitialized)?;

        let series = self.series.get().ok_or(TelemetryError::AlreadyInitialized)?;
        tracing::debug!(
            "registered {} metric families under namespace {:?}",
            series.exposition.len(),
            self.namespace
        );
        Ok(series)
    }

    /// The registered series, or `None` while reporting is disabled.
    #[inline]
    pub fn series(&self) -> Option<&Series> {
        self.series.get()
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.series.get().is_some()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Number of samples a scrape would return. Zero while disabled.
    pub fn series_count(&self) -> usize {
        self.series
            .get()
            .map(|s| s.exposition.series_count())
            .unwrap_or(0)
    }

    /// Render all series in text exposition format. Empty while disabled.
    pub fn render(&self) -> String {
        self.series
            .get()
            .map(|s| s.exposition.render())
            .unwrap_or_default()
    }
}

impl Default for TelemetryRegistry {
    fn default() -> Self {
        Self::disabled()
    }
}
