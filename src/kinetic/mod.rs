// SPDX-License-Identifier: MIT

//! Graph runtime: checkpoint persistence, executor configuration and the
//! workflow graph itself.

pub mod checkpoint;
pub mod config;
pub mod workflow;
