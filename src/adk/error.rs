// SPDX-License-Identifier: MIT

//! Typed error handling for kinetic-graph
//!
//! Each concern gets its own error enum built with thiserror. Errors raised
//! inside node bodies and collaborators stay boxed (`BoxError`) and are
//! wrapped by [`GraphError::NodeExecution`] when they reach the executor.

use thiserror::Error;

use crate::kinetic::workflow::graph::ExecutionStatus;
use crate::kinetic::workflow::state::{ReducerType, State};

/// Boxed error used at node and collaborator boundaries
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error returned by graph execution
#[derive(Debug, Error)]
pub enum GraphError {
    /// Structural problem detected while compiling the graph
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// A reducer rejected a value while merging into state
    #[error("state merge failed{}: {source}", at_node(.node))]
    Merge {
        node: Option<String>,
        source: MergeError,
        state: Box<State>,
    },

    /// A conditional edge produced a label missing from its destination table
    #[error("node '{node}' routed to label '{label}', which has no destination")]
    Routing {
        node: String,
        label: String,
        state: Box<State>,
    },

    /// A node body returned an error
    #[error("node '{node}' failed: {source}")]
    NodeExecution {
        node: String,
        source: BoxError,
        state: Box<State>,
    },

    /// The caller-supplied step limit was reached before the terminal sentinel
    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize, state: Box<State> },

    /// The execution can no longer make progress
    #[error("execution is {0:?} and cannot continue")]
    NotRunnable(ExecutionStatus),

    /// Checkpoint store failure
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

fn at_node(node: &Option<String>) -> String {
    match node {
        Some(id) => format!(" after node '{}'", id),
        None => " on input".to_string(),
    }
}

impl GraphError {
    /// State snapshot captured when the error occurred, if any
    pub fn state(&self) -> Option<&State> {
        match self {
            GraphError::Merge { state, .. }
            | GraphError::Routing { state, .. }
            | GraphError::NodeExecution { state, .. }
            | GraphError::StepLimitExceeded { state, .. } => Some(state.as_ref()),
            _ => None,
        }
    }

    /// Node at which the error occurred, if any
    pub fn node(&self) -> Option<&str> {
        match self {
            GraphError::Merge { node, .. } => node.as_deref(),
            GraphError::Routing { node, .. } | GraphError::NodeExecution { node, .. } => {
                Some(node)
            }
            _ => None,
        }
    }
}

/// Errors detected when compiling a graph definition
#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("graph has no entry point")]
    MissingEntryPoint,

    /// Entry point, edge source or edge target is not a registered node
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("node '{0}' registered more than once")]
    DuplicateNode(String),

    #[error("node '{0}' has more than one outgoing edge")]
    DuplicateEdge(String),

    #[error("node '{0}' has no outgoing edge")]
    MissingEdge(String),

    #[error("conditional edge from '{0}' has no destinations")]
    EmptyDestinations(String),

    #[error("invalid state field '{field}': {reason}")]
    InvalidSchema { field: String, reason: String },
}

/// Reducer/value mismatch raised by a state merge
#[derive(Debug, Error, PartialEq)]
pub enum MergeError {
    #[error("field '{field}' ({reducer}) expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        reducer: ReducerType,
        expected: &'static str,
        found: &'static str,
    },
}

/// Checkpoint store errors
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint storage error: {0}")]
    Storage(String),

    #[error("corrupt checkpoint for thread '{thread_id}': {reason}")]
    Corrupt { thread_id: String, reason: String },

    /// Compare-and-swap rejected the write
    #[error(
        "checkpoint conflict on thread '{thread_id}': expected sequence {expected:?}, found {found:?}"
    )]
    Conflict {
        thread_id: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Condition expression parse errors
#[derive(Debug, Error, PartialEq)]
pub enum ConditionError {
    #[error("could not parse condition: {0}")]
    InvalidCondition(String),

    #[error("could not parse literal: {0}")]
    InvalidLiteral(String),

    #[error("unbalanced parentheses in: {0}")]
    UnbalancedParens(String),
}

/// Errors raised while turning a YAML definition into a compiled graph
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown node kind '{kind}' for node '{node}'")]
    UnknownKind { node: String, kind: String },

    #[error("invalid params for node '{node}': {reason}")]
    InvalidParams { node: String, reason: String },

    #[error("invalid edge from '{from}': {reason}")]
    InvalidEdge { from: String, reason: String },

    #[error(transparent)]
    Condition(#[from] ConditionError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl DefinitionError {
    /// Create an invalid params error
    pub fn params(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid edge error
    pub fn edge(from: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEdge {
            from: from.into(),
            reason: reason.into(),
        }
    }
}

/// Invalid executor configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}
