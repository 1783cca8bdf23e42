// SPDX-License-Identifier: MIT

//! Registry of node kinds and named routers for declarative graphs

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::adk::error::DefinitionError;
use crate::kinetic::workflow::graph::Router;
use crate::kinetic::workflow::node::{IncrementNode, Node, ToolsCondition, UpdateNode};

/// Builds a node of one kind from its YAML params
pub trait NodeFactory: Send + Sync {
    fn build(&self, id: &str, params: &Value) -> Result<Arc<dyn Node>, DefinitionError>;
}

impl<F> NodeFactory for F
where
    F: Fn(&str, &Value) -> Result<Arc<dyn Node>, DefinitionError> + Send + Sync,
{
    fn build(&self, id: &str, params: &Value) -> Result<Arc<dyn Node>, DefinitionError> {
        self(id, params)
    }
}

/// Factory that hands out one pre-built node and rejects params
struct InstanceFactory(Arc<dyn Node>);

impl NodeFactory for InstanceFactory {
    fn build(&self, id: &str, params: &Value) -> Result<Arc<dyn Node>, DefinitionError> {
        match params {
            Value::Null => Ok(self.0.clone()),
            Value::Object(map) if map.is_empty() => Ok(self.0.clone()),
            _ => Err(DefinitionError::params(id, "pre-built node kinds take no params")),
        }
    }
}

/// Kind name -> node factory, plus router name -> router
///
/// Cloning shares the underlying maps.
#[derive(Clone)]
pub struct NodeRegistry {
    factories: Arc<RwLock<HashMap<String, Arc<dyn NodeFactory>>>>,
    routers: Arc<RwLock<HashMap<String, Arc<dyn Router>>>>,
}

impl NodeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            factories: Arc::new(RwLock::new(HashMap::new())),
            routers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registry with the `update` and `increment` kinds and the
    /// `tools_condition` router
    pub fn with_builtins() -> Self {
        let mut factories: HashMap<String, Arc<dyn NodeFactory>> = HashMap::new();
        factories.insert(
            "update".to_string(),
            Arc::new(|id: &str, params: &Value| -> Result<Arc<dyn Node>, DefinitionError> {
                Ok(Arc::new(UpdateNode::from_params(id, params)?))
            }),
        );
        factories.insert(
            "increment".to_string(),
            Arc::new(|id: &str, params: &Value| -> Result<Arc<dyn Node>, DefinitionError> {
                Ok(Arc::new(IncrementNode::from_params(id, params)?))
            }),
        );

        let mut routers: HashMap<String, Arc<dyn Router>> = HashMap::new();
        routers.insert("tools_condition".to_string(), Arc::new(ToolsCondition::new()));

        Self {
            factories: Arc::new(RwLock::new(factories)),
            routers: Arc::new(RwLock::new(routers)),
        }
    }

    /// Register a factory; an existing kind is replaced
    pub async fn register(&self, kind: impl Into<String>, factory: impl NodeFactory + 'static) {
        let mut factories = self.factories.write().await;
        factories.insert(kind.into(), Arc::new(factory));
    }

    /// Register a pre-built node (e.g. a model node holding a client)
    pub async fn register_instance(&self, kind: impl Into<String>, node: Arc<dyn Node>) {
        self.register(kind, InstanceFactory(node)).await;
    }

    pub async fn register_router(&self, name: impl Into<String>, router: Arc<dyn Router>) {
        let mut routers = self.routers.write().await;
        routers.insert(name.into(), router);
    }

    pub async fn get(&self, kind: &str) -> Option<Arc<dyn NodeFactory>> {
        let factories = self.factories.read().await;
        factories.get(kind).cloned()
    }

    pub async fn router(&self, name: &str) -> Option<Arc<dyn Router>> {
        let routers = self.routers.read().await;
        routers.get(name).cloned()
    }

    /// Registered kind names, sorted
    pub async fn kinds(&self) -> Vec<String> {
        let factories = self.factories.read().await;
        let mut kinds: Vec<String> = factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Build node `id` of `kind`
    pub async fn build(
        &self,
        id: &str,
        kind: &str,
        params: &Value,
    ) -> Result<Arc<dyn Node>, DefinitionError> {
        let factory = self
            .get(kind)
            .await
            .ok_or_else(|| DefinitionError::UnknownKind {
                node: id.to_string(),
                kind: kind.to_string(),
            })?;
        factory.build(id, params)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::BoxError;
    use crate::kinetic::workflow::node::FnNode;
    use crate::kinetic::workflow::state::State;
    use serde_json::json;

    fn constant(value: Value) -> Arc<dyn Node> {
        Arc::new(FnNode::new(move |_: &State| -> Result<State, BoxError> {
            Ok(State::new().with("out", value.clone()))
        }))
    }

    #[tokio::test]
    async fn test_builtins() {
        let registry = NodeRegistry::with_builtins();
        assert_eq!(registry.kinds().await, vec!["increment", "update"]);
        assert!(registry.router("tools_condition").await.is_some());

        let node = registry
            .build("inc", "increment", &json!({"field": "n", "by": 2}))
            .await
            .unwrap();
        let delta = node.invoke(&State::new()).await.unwrap();
        assert_eq!(delta.get("n"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_unknown_kind() {
        let registry = NodeRegistry::new();
        let err = registry.build("a", "mystery", &Value::Null).await.err().unwrap();
        assert!(matches!(
            err,
            DefinitionError::UnknownKind { ref node, ref kind } if node == "a" && kind == "mystery"
        ));
    }

    #[tokio::test]
    async fn test_register_closure_factory() {
        let registry = NodeRegistry::new();
        registry
            .register("const", |_id: &str, params: &Value| -> Result<Arc<dyn Node>, DefinitionError> {
                Ok(constant(params.clone()))
            })
            .await;

        let node = registry.build("c", "const", &json!(7)).await.unwrap();
        let delta = node.invoke(&State::new()).await.unwrap();
        assert_eq!(delta.get("out"), Some(&json!(7)));
    }

    #[tokio::test]
    async fn test_register_instance_shares_node() {
        let registry = NodeRegistry::new();
        let node = constant(json!("shared"));
        registry.register_instance("agent", node.clone()).await;

        let a = registry.build("a", "agent", &Value::Null).await.unwrap();
        let b = registry.build("b", "agent", &json!({})).await.unwrap();
        assert!(Arc::ptr_eq(&a, &node));
        assert!(Arc::ptr_eq(&b, &node));

        assert!(matches!(
            registry.build("c", "agent", &json!({"x": 1})).await,
            Err(DefinitionError::InvalidParams { .. })
        ));
    }

    #[tokio::test]
    async fn test_registry_is_clone() {
        let registry = NodeRegistry::new();
        let cloned = registry.clone();
        cloned.register_instance("late", constant(json!(1))).await;
        assert!(registry.get("late").await.is_some());
    }
}
