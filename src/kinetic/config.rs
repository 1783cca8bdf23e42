// SPDX-License-Identifier: MIT

//! Executor configuration from the environment
//!
//! | variable | meaning |
//! |----------|---------|
//! | `KINETIC_GRAPH_MAX_STEPS` | step limit per run (unset = unbounded) |
//! | `KINETIC_GRAPH_CHECKPOINT_DIR` | directory for the file checkpoint store |
//! | `KINETIC_GRAPH_WRITE_POLICY` | `last_write_wins` or `compare_and_swap` |

use std::path::PathBuf;

use crate::adk::error::ConfigError;
use crate::kinetic::checkpoint::WritePolicy;
use crate::kinetic::workflow::graph::RunConfig;

pub const MAX_STEPS_VAR: &str = "KINETIC_GRAPH_MAX_STEPS";
pub const CHECKPOINT_DIR_VAR: &str = "KINETIC_GRAPH_CHECKPOINT_DIR";
pub const WRITE_POLICY_VAR: &str = "KINETIC_GRAPH_WRITE_POLICY";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutorConfig {
    pub max_steps: Option<usize>,
    pub checkpoint_dir: Option<PathBuf>,
    pub write_policy: WritePolicy,
}

impl ExecutorConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup; empty values count
    /// as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let max_steps = match get(MAX_STEPS_VAR) {
            Some(value) => Some(parse_max_steps(&value)?),
            None => None,
        };

        let write_policy = match get(WRITE_POLICY_VAR) {
            Some(value) => value.parse::<WritePolicy>().map_err(|reason| ConfigError::Invalid {
                key: WRITE_POLICY_VAR.to_string(),
                value: value.clone(),
                reason,
            })?,
            None => WritePolicy::default(),
        };

        Ok(Self {
            max_steps,
            checkpoint_dir: get(CHECKPOINT_DIR_VAR).map(PathBuf::from),
            write_policy,
        })
    }

    /// Run options for one invocation on `thread_id`
    pub fn run_config(&self, thread_id: Option<String>) -> RunConfig {
        RunConfig {
            thread_id,
            max_steps: self.max_steps,
            write_policy: self.write_policy,
        }
    }
}

fn parse_max_steps(value: &str) -> Result<usize, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key: MAX_STEPS_VAR.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };
    match value.trim().parse::<usize>() {
        Ok(0) => Err(invalid("must be at least 1")),
        Ok(n) => Ok(n),
        Err(_) => Err(invalid("not a positive integer")),
    }
}
