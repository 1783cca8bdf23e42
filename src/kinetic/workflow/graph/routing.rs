// SPDX-License-Identifier: MIT

//! Routers for conditional edges
//!
//! A router maps state to a label; the edge's destination table maps the
//! label to a [`Target`](super::Target). Labels are checked against the
//! table at run time.

use crate::adk::error::ConditionError;
use crate::kinetic::workflow::condition::{self, Expression};
use crate::kinetic::workflow::state::State;

/// Picks a routing label from the current state
pub trait Router: Send + Sync {
    fn route(&self, state: &State) -> String;
}

impl<F> Router for F
where
    F: Fn(&State) -> String + Send + Sync,
{
    fn route(&self, state: &State) -> String {
        self(state)
    }
}

/// Routes on condition expressions
///
/// Conditions are tried in order; the first one that holds decides the
/// label. If none holds, the default label is returned.
#[derive(Debug, Clone)]
pub struct ExpressionRouter {
    routes: Vec<(Expression, String)>,
    default: String,
}

impl ExpressionRouter {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            routes: Vec::new(),
            default: default.into(),
        }
    }

    /// Add a route, parsing its condition
    pub fn when(mut self, condition: &str, label: impl Into<String>) -> Result<Self, ConditionError> {
        let expr = condition::parse(condition)?;
        self.routes.push((expr, label.into()));
        Ok(self)
    }

    /// Add a route from an already parsed condition
    pub fn when_expr(mut self, expr: Expression, label: impl Into<String>) -> Self {
        self.routes.push((expr, label.into()));
        self
    }

    /// Every label this router can return, default last
    pub fn labels(&self) -> Vec<&str> {
        self.routes
            .iter()
            .map(|(_, label)| label.as_str())
            .chain(std::iter::once(self.default.as_str()))
            .collect()
    }
}

impl Router for ExpressionRouter {
    fn route(&self, state: &State) -> String {
        self.routes
            .iter()
            .find(|(expr, _)| condition::evaluate(expr, state))
            .map(|(_, label)| label.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}
