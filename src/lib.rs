// SPDX-License-Identifier: MIT

//! kinetic-graph - a stateful graph executor for multi-agent workflows
//!
//! Nodes read a shared [`State`](kinetic::workflow::state::State) and return
//! partial updates that are merged through per-field reducers. Edges are
//! static or conditional; runs can be checkpointed per thread and resumed.
//!
//! ```no_run
//! use kinetic_graph::kinetic::workflow::graph::{StateGraph, Target, END};
//! use kinetic_graph::kinetic::workflow::node::IncrementNode;
//! use kinetic_graph::kinetic::workflow::state::{State, StateSchema};
//!
//! # async fn demo() -> Result<(), kinetic_graph::adk::error::GraphError> {
//! let mut graph = StateGraph::new("counter", StateSchema::new());
//! graph
//!     .add_node("inc", IncrementNode::new("counter", 1.0))
//!     .set_entry_point("inc")
//!     .add_conditional_edges(
//!         "inc",
//!         |state: &State| {
//!             let n = state.get("counter").and_then(|v| v.as_i64()).unwrap_or(0);
//!             if n < 3 { "again".to_string() } else { "done".to_string() }
//!         },
//!         [("again", Target::node("inc")), ("done", END)],
//!     );
//! let graph = graph.compile()?;
//! let state = graph.run(State::new(), None).await?;
//! assert_eq!(state.get("counter"), Some(&serde_json::json!(3)));
//! # Ok(())
//! # }
//! ```

pub mod adk;
pub mod kinetic;
