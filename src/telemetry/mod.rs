//! Telemetry Layer
//!
//! Labeled gauge storage and the registry of series published for scraping.

pub mod gauge;
pub mod registry;

pub use gauge::{Family, GaugeVec};
pub use registry::{
    BackendGauge, Exposition, Series, ServerGauge, TelemetryError, TelemetryRegistry,
    DEFAULT_NAMESPACE,
};
