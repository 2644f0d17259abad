//! DashMap Server Catalog
//!
//! Implements ServerCatalog using DashMap for lock-free concurrent access.

use crate::domain::entities::Server;
use crate::domain::ports::ServerCatalog;
use dashmap::DashMap;
use std::sync::Arc;

/// DashMap-backed server catalog.
///
/// The balancing core publishes server snapshots with `upsert`; the
/// management API reads them through the `ServerCatalog` port.
#[derive(Clone, Default)]
pub struct DashMapServerCatalog {
    servers: Arc<DashMap<String, Server>>,
}

impl DashMapServerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the snapshot of a server.
    pub fn upsert(&self, server: Server) {
        self.servers.insert(server.name.clone(), server);
    }

    /// Remove a server. Returns whether it was present.
    pub fn remove(&self, name: &str) -> bool {
        self.servers.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

impl ServerCatalog for DashMapServerCatalog {
    fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.servers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn get(&self, name: &str) -> Option<Server> {
        self.servers.get(name).map(|e| e.value().clone())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::entities::Backend;
    use crate::domain::value_objects::Target;

    #[test]
    fn test_new_is_empty() {
        let catalog = DashMapServerCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.list().is_empty());
    }

    #[test]
    fn test_upsert_and_get() {
        let catalog = DashMapServerCatalog::new();
        catalog.upsert(Server::new("web").with_backend(Backend::new(Target::new("a", "1"))));

        let server = catalog.get("web").unwrap();
        assert_eq!(server.name, "web");
        assert_eq!(server.backends.len(), 1);
        assert!(catalog.get("api").is_none());
    }

    #[test]
    fn test_upsert_replaces() {
        let catalog = DashMapServerCatalog::new();
        catalog.upsert(Server::new("web"));
        let mut updated = Server::new("web");
        updated.active_connections = 12;
        catalog.upsert(updated);

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("web").unwrap().active_connections, 12);
    }

    #[test]
    fn test_list_sorted() {
        let catalog = DashMapServerCatalog::new();
        catalog.upsert(Server::new("web"));
        catalog.upsert(Server::new("api"));
        catalog.upsert(Server::new("db"));

        assert_eq!(catalog.list(), vec!["api", "db", "web"]);
    }

    #[test]
    fn test_remove() {
        let catalog = DashMapServerCatalog::new();
        catalog.upsert(Server::new("web"));

        assert!(catalog.remove("web"));
        assert!(!catalog.remove("web"));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let catalog = DashMapServerCatalog::new();
        let clone = catalog.clone();
        clone.upsert(Server::new("web"));

        assert_eq!(catalog.list(), vec!["web"]);
    }
}
