//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};

/// Upstream endpoint the balancer forwards connections to.
///
/// Host and port are kept as the strings the balancing core resolved them to,
/// since they are used verbatim as metric label values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target {
    pub host: String,
    pub port: String,
}

impl Target {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    /// Label values in `[host, port]` order.
    pub fn labels(&self) -> [&str; 2] {
        [self.host.as_str(), self.port.as_str()]
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_target_display() {
        let t = Target::new("10.0.0.1", "8080");
        assert_eq!(t.to_string(), "10.0.0.1:8080");
    }

    #[test]
    fn test_target_as_map_key() {
        let mut map = HashMap::new();
        map.insert(Target::new("a", "1"), 1);
        map.insert(Target::new("a", "1"), 2);
        map.insert(Target::new("a", "2"), 3);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&Target::new("a", "1")], 2);
    }

    #[test]
    fn test_target_labels_order() {
        let t = Target::new("h", "p");
        assert_eq!(t.labels(), ["h", "p"]);
    }

    #[test]
    fn test_target_ordering() {
        let mut targets = vec![Target::new("b", "1"), Target::new("a", "2"), Target::new("a", "1")];
        targets.sort();
        assert_eq!(targets[0], Target::new("a", "1"));
        assert_eq!(targets[2], Target::new("b", "1"));
    }
}
