//! Server Catalog Port
//!
//! Read access to the servers the balancing core is running.

use crate::domain::entities::Server;

/// Catalog of balanced servers.
///
/// This is an outbound port used by the management API to list servers
/// without knowing how the balancing core stores them.
pub trait ServerCatalog: Send + Sync {
    /// Names of all known servers, sorted.
    fn list(&self) -> Vec<String>;

    /// Snapshot of a single server.
    fn get(&self, name: &str) -> Option<Server>;
}
