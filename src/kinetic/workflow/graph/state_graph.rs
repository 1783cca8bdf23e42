// SPDX-License-Identifier: MIT

//! Graph builder
//!
//! Collects nodes and edges, then validates the whole structure in
//! [`StateGraph::compile`]. Problems found while adding (duplicates) are
//! remembered and reported at compile time so the builder methods can
//! chain.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::executor::CompiledGraph;
use super::routing::Router;
use super::types::{Edge, Target, END};
use crate::adk::error::CompileError;
use crate::kinetic::checkpoint::CheckpointStore;
use crate::kinetic::workflow::node::Node;
use crate::kinetic::workflow::state::StateSchema;

/// Mutable graph under construction
pub struct StateGraph {
    name: String,
    schema: StateSchema,
    nodes: HashMap<String, Arc<dyn Node>>,
    node_order: Vec<String>,
    edges: Vec<(String, Edge)>,
    entry: Option<String>,
    duplicates: Vec<String>,
}

impl StateGraph {
    pub fn new(name: impl Into<String>, schema: StateSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            nodes: HashMap::new(),
            node_order: Vec::new(),
            edges: Vec::new(),
            entry: None,
            duplicates: Vec::new(),
        }
    }

    pub fn add_node(&mut self, id: impl Into<String>, node: impl Node + 'static) -> &mut Self {
        self.add_node_arc(id, Arc::new(node))
    }

    /// Register a shared node; the same instance may back several ids
    pub fn add_node_arc(&mut self, id: impl Into<String>, node: Arc<dyn Node>) -> &mut Self {
        let id = id.into();
        if self.nodes.insert(id.clone(), node).is_some() {
            self.duplicates.push(id);
        } else {
            self.node_order.push(id);
        }
        self
    }

    /// Static edge: `from` always continues to `to`
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<Target>) -> &mut Self {
        self.edges.push((from.into(), Edge::Static(to.into())));
        self
    }

    /// Conditional edge: the router's label is looked up in `destinations`
    pub fn add_conditional_edges<R, I, L, T>(
        &mut self,
        from: impl Into<String>,
        router: R,
        destinations: I,
    ) -> &mut Self
    where
        R: Router + 'static,
        I: IntoIterator<Item = (L, T)>,
        L: Into<String>,
        T: Into<Target>,
    {
        let destinations = destinations
            .into_iter()
            .map(|(label, target)| (label.into(), target.into()))
            .collect();
        self.edges.push((
            from.into(),
            Edge::Conditional {
                router: Arc::new(router),
                destinations,
            },
        ));
        self
    }

    pub fn set_entry_point(&mut self, id: impl Into<String>) -> &mut Self {
        self.entry = Some(id.into());
        self
    }

    /// Shorthand for a static edge from `id` to [`END`]
    pub fn set_finish_point(&mut self, id: impl Into<String>) -> &mut Self {
        self.add_edge(id, END)
    }

    /// Validate and freeze the graph without checkpointing
    pub fn compile(self) -> Result<CompiledGraph, CompileError> {
        self.build(None)
    }

    /// Validate and freeze the graph, persisting runs that carry a thread id
    pub fn compile_with_checkpointer(
        self,
        checkpointer: Arc<dyn CheckpointStore>,
    ) -> Result<CompiledGraph, CompileError> {
        self.build(Some(checkpointer))
    }

    fn build(
        self,
        checkpointer: Option<Arc<dyn CheckpointStore>>,
    ) -> Result<CompiledGraph, CompileError> {
        if let Some(id) = self.duplicates.first() {
            return Err(CompileError::DuplicateNode(id.clone()));
        }

        let entry = self.entry.ok_or(CompileError::MissingEntryPoint)?;
        if !self.nodes.contains_key(&entry) {
            return Err(CompileError::UnknownNode(entry));
        }

        let mut edges: HashMap<String, Edge> = HashMap::with_capacity(self.edges.len());
        for (from, edge) in self.edges {
            if !self.nodes.contains_key(&from) {
                return Err(CompileError::UnknownNode(from));
            }
            if let Edge::Conditional { destinations, .. } = &edge {
                if destinations.is_empty() {
                    return Err(CompileError::EmptyDestinations(from));
                }
            }
            for target in edge.targets() {
                if let Some(id) = target.node_id() {
                    if !self.nodes.contains_key(id) {
                        return Err(CompileError::UnknownNode(id.to_string()));
                    }
                }
            }
            if edges.contains_key(&from) {
                return Err(CompileError::DuplicateEdge(from));
            }
            edges.insert(from, edge);
        }

        let sources: HashSet<&String> = edges.keys().collect();
        if let Some(id) = self.node_order.iter().find(|id| !sources.contains(id)) {
            return Err(CompileError::MissingEdge(id.clone()));
        }

        self.schema.validate()?;

        log::debug!(
            "Compiled graph '{}' with {} nodes, entry '{}'",
            self.name,
            self.node_order.len(),
            entry
        );

        Ok(CompiledGraph {
            name: self.name,
            schema: self.schema,
            nodes: self.nodes,
            node_order: self.node_order,
            edges,
            entry,
            checkpointer,
        })
    }
}
