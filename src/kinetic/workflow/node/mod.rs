// SPDX-License-Identifier: MIT

//! Graph nodes
//!
//! A node reads the current state and returns a partial state holding only
//! the fields it updates. The executor merges that delta using the
//! schema's reducers; nodes never mutate the state they receive.

mod agent;
mod builtin;

pub use agent::{ModelNode, ToolNode, ToolsCondition, MESSAGES_FIELD};
pub use builtin::{IncrementNode, UpdateNode};

use async_trait::async_trait;

use crate::adk::error::BoxError;
use crate::kinetic::workflow::state::{PartialState, State};

/// A unit of work in a graph
#[async_trait]
pub trait Node: Send + Sync {
    async fn invoke(&self, state: &State) -> Result<PartialState, BoxError>;
}

/// Node backed by a synchronous closure
pub struct FnNode<F> {
    func: F,
}

impl<F> FnNode<F>
where
    F: Fn(&State) -> Result<PartialState, BoxError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Node for FnNode<F>
where
    F: Fn(&State) -> Result<PartialState, BoxError> + Send + Sync,
{
    async fn invoke(&self, state: &State) -> Result<PartialState, BoxError> {
        (self.func)(state)
    }
}
