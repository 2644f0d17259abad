//! Domain Entities - Core business objects
//!
//! Snapshots the balancing core hands to the telemetry layer. They carry no
//! behaviour beyond simple accessors; the core owns and mutates the live state.

use crate::domain::value_objects::Target;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Backends of one server, keyed by their target.
pub type BackendsByTarget = HashMap<Target, Backend>;

/// Connection and traffic counters for a single backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendStats {
    /// Whether the health checker currently considers this backend usable
    pub live: bool,
    /// Connections currently proxied to this backend
    pub active_connections: u64,
    /// Connection attempts the backend refused
    pub refused_connections: u64,
    /// Connections ever established to this backend
    pub total_connections: u64,
    /// Cumulative bytes received from the backend
    pub rx_bytes: u64,
    /// Cumulative bytes sent to the backend
    pub tx_bytes: u64,
    /// Bytes received during the last sampling second
    pub rx_second: u64,
    /// Bytes sent during the last sampling second
    pub tx_second: u64,
}

/// A backend the balancer can forward connections to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backend {
    pub target: Target,
    /// Lower value is preferred by priority-aware strategies
    pub priority: u32,
    /// Relative weight for weighted strategies
    pub weight: u32,
    pub stats: BackendStats,
}

impl Backend {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            priority: 1,
            weight: 1,
            stats: BackendStats::default(),
        }
    }

    pub fn with_stats(mut self, stats: BackendStats) -> Self {
        self.stats = stats;
        self
    }
}

/// Aggregate traffic counters for a server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthStats {
    pub rx_total: u64,
    pub tx_total: u64,
    pub rx_second: u64,
    pub tx_second: u64,
}

/// Point-in-time view of a balanced server and its backends.
#[derive(Debug, Clone, Default)]
pub struct Server {
    pub name: String,
    pub active_connections: u64,
    pub bandwidth: BandwidthStats,
    pub backends: BackendsByTarget,
}

impl Server {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Insert or replace a backend, keyed by its target.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backends.insert(backend.target.clone(), backend);
        self
    }

    /// Number of backends currently marked live.
    pub fn live_backends(&self) -> usize {
        self.backends.values().filter(|b| b.stats.live).count()
    }

    /// Backends sorted by target, for stable listings.
    pub fn sorted_backends(&self) -> Vec<&Backend> {
        let mut backends: Vec<&Backend> = self.backends.values().collect();
        backends.sort_by(|a, b| a.target.cmp(&b.target));
        backends
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_backend_defaults() {
        let b = Backend::new(Target::new("10.0.0.1", "80"));
        assert_eq!(b.priority, 1);
        assert_eq!(b.weight, 1);
        assert_eq!(b.stats, BackendStats::default());
        assert!(!b.stats.live);
    }

    #[test]
    fn test_server_with_backend_replaces_same_target() {
        let t = Target::new("10.0.0.1", "80");
        let server = Server::new("web")
            .with_backend(Backend::new(t.clone()))
            .with_backend(Backend::new(t.clone()).with_stats(BackendStats {
                rx_bytes: 10,
                ..Default::default()
            }));

        assert_eq!(server.backends.len(), 1);
        assert_eq!(server.backends[&t].stats.rx_bytes, 10);
    }

    #[test]
    fn test_live_backends() {
        let live = BackendStats {
            live: true,
            ..Default::default()
        };
        let server = Server::new("web")
            .with_backend(Backend::new(Target::new("a", "1")).with_stats(live.clone()))
            .with_backend(Backend::new(Target::new("b", "1")))
            .with_backend(Backend::new(Target::new("c", "1")).with_stats(live));

        assert_eq!(server.live_backends(), 2);
    }

    #[test]
    fn test_sorted_backends() {
        let server = Server::new("web")
            .with_backend(Backend::new(Target::new("c", "1")))
            .with_backend(Backend::new(Target::new("a", "1")))
            .with_backend(Backend::new(Target::new("b", "1")));

        let hosts: Vec<&str> = server
            .sorted_backends()
            .iter()
            .map(|b| b.target.host.as_str())
            .collect();
        assert_eq!(hosts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_bandwidth_stats_serialize() {
        let bw = BandwidthStats {
            rx_total: 1,
            tx_total: 2,
            rx_second: 3,
            tx_second: 4,
        };
        let json = serde_json::to_value(bw).unwrap();
        assert_eq!(json["rx_total"], 1);
        assert_eq!(json["tx_second"], 4);
    }
}
