// SPDX-License-Identifier: MIT

//! Checkpoint persistence for graph runs
//!
//! A checkpoint is an immutable snapshot of graph state tied to a thread id
//! and a per-thread sequence number. Stores assign sequence numbers, keep
//! history and serialize writes so that every `save` commits exactly one
//! snapshot.
//!
//! Implementations:
//! - [`InMemoryCheckpointStore`] - process-local, for tests and short-lived runs
//! - [`FileCheckpointStore`] - one JSON file per snapshot on disk

mod file;
mod memory;

pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adk::error::CheckpointError;
use crate::kinetic::workflow::state::State;

/// Persisted state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    /// Starts at 1 and increases by one per save on the thread
    pub sequence: u64,
    pub state: State,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub(crate) fn next(thread_id: &str, latest: Option<u64>, state: &State) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            sequence: latest.map_or(1, |seq| seq + 1),
            state: state.clone(),
            created_at: Utc::now(),
        }
    }
}

/// How the executor commits the final checkpoint of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Always append a new snapshot, even if another run wrote in between
    #[default]
    LastWriteWins,
    /// Fail with [`CheckpointError::Conflict`] if the thread moved on since
    /// the run loaded it
    CompareAndSwap,
}

impl std::str::FromStr for WritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last_write_wins" | "lww" => Ok(WritePolicy::LastWriteWins),
            "compare_and_swap" | "cas" => Ok(WritePolicy::CompareAndSwap),
            other => Err(format!("unknown write policy: {}", other)),
        }
    }
}

/// Storage backend for checkpoints, keyed by thread id
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Latest snapshot for the thread, if any
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Commit `state` as the thread's next snapshot
    async fn save(&self, thread_id: &str, state: &State) -> Result<Checkpoint, CheckpointError>;

    /// Commit only if the thread's latest sequence equals `expected`
    /// (`None` = the thread has no snapshot yet)
    async fn save_if(
        &self,
        thread_id: &str,
        state: &State,
        expected: Option<u64>,
    ) -> Result<Checkpoint, CheckpointError>;

    /// Every snapshot for the thread, oldest first
    async fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>, CheckpointError>;

    /// Thread ids with at least one snapshot, sorted
    async fn threads(&self) -> Result<Vec<String>, CheckpointError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_next_sequence() {
        let state = State::new().with("a", json!(1));
        assert_eq!(Checkpoint::next("t", None, &state).sequence, 1);
        assert_eq!(Checkpoint::next("t", Some(4), &state).sequence, 5);
    }

    #[test]
    fn test_write_policy_from_str() {
        assert_eq!("cas".parse::<WritePolicy>(), Ok(WritePolicy::CompareAndSwap));
        assert_eq!(
            "Last_Write_Wins".parse::<WritePolicy>(),
            Ok(WritePolicy::LastWriteWins)
        );
        assert!("sometimes".parse::<WritePolicy>().is_err());
    }

    #[test]
    fn test_checkpoint_serializes_state_flat() {
        let checkpoint = Checkpoint::next("thread-1", None, &State::new().with("n", json!(3)));
        let value = serde_json::to_value(&checkpoint).unwrap();
        assert_eq!(value["state"], json!({"n": 3}));
        assert_eq!(value["sequence"], json!(1));

        let back: Checkpoint = serde_json::from_value(value).unwrap();
        assert_eq!(back, checkpoint);
    }
}
