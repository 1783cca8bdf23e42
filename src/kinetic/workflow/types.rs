// SPDX-License-Identifier: MIT

//! YAML schema types for graph definitions
//!
//! ```yaml
//! name: counter
//! state:
//!   counter: { type: number, reducer: replace, default: 0 }
//! entry: a
//! nodes:
//!   - { id: a, kind: increment, params: { field: counter } }
//!   - { id: b, kind: update, params: { values: { seen: true } } }
//! edges:
//!   - { from: a, to: b }
//!   - from: b
//!     routes:
//!       - { when: "counter < 3", label: again }
//!     default: done
//!     destinations: { again: a }
//!     finish_on: [done]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::kinetic::workflow::state::StateSchema;

/// Top-level graph definition
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct GraphDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: StateSchema,
    /// Entry node id
    pub entry: String,
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
}

/// A node and the kind that builds it
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct NodeDef {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub params: Value,
}

/// Outgoing edge of a node
///
/// Exactly one of `to`, `finish: true`, `routes`/`default` or `router`
/// describes where control goes next.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct EdgeDef {
    pub from: String,
    /// Static target node
    pub to: Option<String>,
    /// Static edge to the terminal sentinel
    #[serde(default)]
    pub finish: bool,
    /// Ordered condition routes
    #[serde(default)]
    pub routes: Vec<RouteDef>,
    /// Label used when no route matches
    pub default: Option<String>,
    /// Named router from the registry instead of condition routes
    pub router: Option<String>,
    /// Label -> node id
    #[serde(default)]
    pub destinations: HashMap<String, String>,
    /// Labels that end the run
    #[serde(default)]
    pub finish_on: Vec<String>,
}

/// One condition route of a conditional edge
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RouteDef {
    pub when: String,
    pub label: String,
}

impl EdgeDef {
    /// Whether this edge picks its target at run time
    pub fn is_conditional(&self) -> bool {
        !self.routes.is_empty() || self.default.is_some() || self.router.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinetic::workflow::state::ReducerType;

    #[test]
    fn test_parse_definition() {
        let yaml = r#"
name: demo
state:
  log: { type: array, reducer: append }
entry: a
nodes:
  - id: a
    kind: update
    params:
      values: { log: [hello] }
edges:
  - from: a
    finish: true
"#;
        let def: GraphDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.name, "demo");
        assert_eq!(def.description, "");
        assert_eq!(def.state.reducer("log"), ReducerType::Append);
        assert_eq!(def.nodes[0].params["values"]["log"][0], "hello");
        assert!(def.edges[0].finish);
        assert!(!def.edges[0].is_conditional());
    }

    #[test]
    fn test_parse_conditional_edge() {
        let yaml = r#"
from: check
routes:
  - when: "score > 0.5"
    label: pass
default: fail
destinations:
  fail: retry
finish_on: [pass]
"#;
        let edge: EdgeDef = serde_yaml::from_str(yaml).unwrap();
        assert!(edge.is_conditional());
        assert_eq!(edge.routes[0].label, "pass");
        assert_eq!(edge.destinations.get("fail"), Some(&"retry".to_string()));
        assert_eq!(edge.finish_on, vec!["pass"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
from: a
goto: b
"#;
        assert!(serde_yaml::from_str::<EdgeDef>(yaml).is_err());
    }

    #[test]
    fn test_node_params_default_to_null() {
        let node: NodeDef = serde_yaml::from_str("{ id: x, kind: agent }").unwrap();
        assert!(node.params.is_null());
    }
}
