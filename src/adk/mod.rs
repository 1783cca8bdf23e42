// SPDX-License-Identifier: MIT

//! Agent development kit: error types and the collaborator traits agent
//! nodes call out to.

pub mod error;
pub mod model;
pub mod tool;
