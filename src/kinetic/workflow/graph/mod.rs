// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! Build a graph with [`StateGraph`], compile it into a [`CompiledGraph`]
//! and run it. Nodes are visited one at a time along static or
//! conditional edges until an edge resolves to [`END`].

mod executor;
mod routing;
mod state_graph;
mod types;

pub use executor::{CompiledGraph, Execution, ExecutionStatus, RunConfig, RunOutput};
pub use routing::{ExpressionRouter, Router};
pub use state_graph::StateGraph;
pub use types::{Edge, Target, END};
