// SPDX-License-Identifier: MIT

//! Graph builder - turns YAML definitions into compiled graphs
//!
//! Node kinds are resolved through a [`NodeRegistry`]; edges are translated
//! into static or conditional edges on a [`StateGraph`], which then runs
//! the usual compile-time validation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::adk::error::DefinitionError;
use crate::kinetic::checkpoint::CheckpointStore;
use crate::kinetic::workflow::graph::{
    CompiledGraph, ExpressionRouter, Router, StateGraph, Target, END,
};
use crate::kinetic::workflow::loader::GraphLoader;
use crate::kinetic::workflow::registry::NodeRegistry;
use crate::kinetic::workflow::types::{EdgeDef, GraphDefinition};

/// High-level builder for constructing graphs from YAML definitions
pub struct Builder {
    loader: GraphLoader,
    registry: NodeRegistry,
    checkpointer: Option<Arc<dyn CheckpointStore>>,
}

impl Builder {
    pub fn new(registry: NodeRegistry) -> Self {
        Self {
            loader: GraphLoader::new(),
            registry,
            checkpointer: None,
        }
    }

    /// Attach a checkpoint store to every graph this builder compiles
    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn CheckpointStore>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Build a graph from a YAML file path
    pub async fn build_graph<P: AsRef<Path>>(&self, path: P) -> Result<CompiledGraph, DefinitionError> {
        let def = self.loader.load_graph(path)?;
        self.build_from_def(&def).await
    }

    /// Build a graph from a parsed definition
    pub async fn build_from_def(&self, def: &GraphDefinition) -> Result<CompiledGraph, DefinitionError> {
        let mut graph = StateGraph::new(def.name.clone(), def.state.clone());

        for node_def in &def.nodes {
            let node = self
                .registry
                .build(&node_def.id, &node_def.kind, &node_def.params)
                .await?;
            graph.add_node_arc(node_def.id.clone(), node);
        }

        for edge in &def.edges {
            self.add_edge(&mut graph, edge).await?;
        }
        graph.set_entry_point(def.entry.clone());

        let compiled = match &self.checkpointer {
            Some(store) => graph.compile_with_checkpointer(store.clone())?,
            None => graph.compile()?,
        };

        log::info!(
            "Built graph '{}' with {} nodes and {} edges",
            def.name,
            def.nodes.len(),
            def.edges.len()
        );
        Ok(compiled)
    }

    async fn add_edge(&self, graph: &mut StateGraph, edge: &EdgeDef) -> Result<(), DefinitionError> {
        let from = edge.from.as_str();

        if !edge.is_conditional() {
            if !edge.destinations.is_empty() || !edge.finish_on.is_empty() {
                return Err(DefinitionError::edge(
                    from,
                    "`destinations` and `finish_on` need `routes`, `default` or `router`",
                ));
            }
            match (&edge.to, edge.finish) {
                (Some(to), false) => graph.add_edge(from, to.as_str()),
                (None, true) => graph.add_edge(from, END),
                (Some(_), true) => {
                    return Err(DefinitionError::edge(from, "`to` and `finish` are exclusive"))
                }
                (None, false) => return Err(DefinitionError::edge(from, "edge has no target")),
            };
            return Ok(());
        }

        if edge.to.is_some() || edge.finish {
            return Err(DefinitionError::edge(
                from,
                "a conditional edge cannot also set `to` or `finish`",
            ));
        }

        let destinations = destination_table(edge)?;

        let router: Arc<dyn Router> = match &edge.router {
            Some(name) => {
                if !edge.routes.is_empty() || edge.default.is_some() {
                    return Err(DefinitionError::edge(
                        from,
                        "`router` cannot be combined with `routes` or `default`",
                    ));
                }
                self.registry
                    .router(name)
                    .await
                    .ok_or_else(|| DefinitionError::edge(from, format!("unknown router '{}'", name)))?
            }
            None => {
                let default = edge.default.as_deref().ok_or_else(|| {
                    DefinitionError::edge(from, "conditional routes need a `default` label")
                })?;
                let mut router = ExpressionRouter::new(default);
                for route in &edge.routes {
                    router = router.when(&route.when, route.label.as_str())?;
                }
                if let Some(label) = router
                    .labels()
                    .into_iter()
                    .find(|label| !destinations.contains_key(*label))
                {
                    return Err(DefinitionError::edge(
                        from,
                        format!("label '{}' has no destination", label),
                    ));
                }
                Arc::new(router)
            }
        };

        graph.add_conditional_edges(from, SharedRouter(router), destinations);
        Ok(())
    }
}

/// `destinations` plus every `finish_on` label mapped to [`END`]
fn destination_table(edge: &EdgeDef) -> Result<HashMap<String, Target>, DefinitionError> {
    let mut table: HashMap<String, Target> = edge
        .destinations
        .iter()
        .map(|(label, node)| (label.clone(), Target::node(node.as_str())))
        .collect();

    for label in &edge.finish_on {
        if table.insert(label.clone(), END).is_some() {
            return Err(DefinitionError::edge(
                &edge.from,
                format!("label '{}' is both a destination and in `finish_on`", label),
            ));
        }
    }
    Ok(table)
}

/// Adapter so registry routers (shared via `Arc`) fit the builder API
struct SharedRouter(Arc<dyn Router>);

impl Router for SharedRouter {
    fn route(&self, state: &crate::kinetic::workflow::state::State) -> String {
        self.0.route(state)
    }
}
