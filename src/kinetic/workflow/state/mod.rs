// SPDX-License-Identifier: MIT

//! State management for graph workflows
//!
//! This module provides:
//! - `StateSchema` - declares field types, reducers and defaults
//! - `State` - the ordered field map threaded between nodes
//! - `ReducerType` - strategies for merging partial updates into state

mod container;
mod schema;

pub use container::{value_kind, PartialState, State};
pub use schema::{FieldType, ReducerType, StateFieldDef, StateSchema};
