// SPDX-License-Identifier: MIT

//! Condition expressions for conditional edges
//!
//! Conditions are small boolean expressions evaluated against graph state:
//! - `intent == 'search'`
//! - `counter < 3`
//! - `intent == 'bug' and (priority > 3 or not triaged == true)`
//!
//! Parsing happens when a graph is built, so malformed expressions fail
//! before any node runs.

mod ast;
mod evaluator;
mod parser;

pub use ast::{CompareOp, Expression, Literal};
pub use evaluator::evaluate;
pub use parser::parse;
