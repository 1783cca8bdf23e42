//! Edge table types
//!
//! Nodes are addressed by string id. The terminal sentinel is a separate
//! [`Target`] variant so no node id can collide with it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::routing::Router;

/// Where control goes after a node completes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Node(String),
    End,
}

/// Terminal sentinel
pub const END: Target = Target::End;

impl Target {
    pub fn node(id: impl Into<String>) -> Self {
        Target::Node(id.into())
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Target::End)
    }

    /// Node id, or `None` for the terminal sentinel
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Target::Node(id) => Some(id),
            Target::End => None,
        }
    }
}

impl From<&str> for Target {
    fn from(id: &str) -> Self {
        Target::Node(id.to_string())
    }
}

impl From<String> for Target {
    fn from(id: String) -> Self {
        Target::Node(id)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Node(id) => f.write_str(id),
            Target::End => f.write_str("<end>"),
        }
    }
}

/// Outgoing transition of a node
#[derive(Clone)]
pub enum Edge {
    Static(Target),
    Conditional {
        router: Arc<dyn Router>,
        destinations: HashMap<String, Target>,
    },
}

impl Edge {
    /// Every target this edge can lead to
    pub fn targets(&self) -> Vec<&Target> {
        match self {
            Edge::Static(target) => vec![target],
            Edge::Conditional { destinations, .. } => destinations.values().collect(),
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Static(target) => f.debug_tuple("Static").field(target).finish(),
            Edge::Conditional { destinations, .. } => f
                .debug_struct("Conditional")
                .field("destinations", destinations)
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_is_not_a_node() {
        assert!(END.is_end());
        assert_eq!(END.node_id(), None);

        // A node literally named like the sentinel's display form is still a node
        let node = Target::from("<end>");
        assert!(!node.is_end());
        assert_ne!(node, END);
    }

    #[test]
    fn test_target_from_str() {
        assert_eq!(Target::from("a"), Target::Node("a".to_string()));
        assert_eq!(Target::node("b").node_id(), Some("b"));
        assert_eq!(Target::node("b").to_string(), "b");
    }

    #[test]
    fn test_static_edge_targets() {
        let edge = Edge::Static(Target::node("next"));
        assert_eq!(edge.targets(), vec![&Target::node("next")]);
    }
}
