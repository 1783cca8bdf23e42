// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Checkpoint, CheckpointStore};
use crate::adk::error::CheckpointError;
use crate::kinetic::workflow::state::State;

/// In-memory checkpoint store
///
/// Keeps full history per thread. Writes take the map's write lock, so
/// concurrent saves on one thread receive consecutive sequence numbers.
/// Cloning shares the underlying storage.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    threads: Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn commit(
        &self,
        thread_id: &str,
        state: &State,
        expected: Option<Option<u64>>,
    ) -> Result<Checkpoint, CheckpointError> {
        let mut threads = self.threads.write().await;
        let latest = threads
            .get(thread_id)
            .and_then(|history| history.last())
            .map(|cp| cp.sequence);

        if let Some(expected) = expected {
            if expected != latest {
                return Err(CheckpointError::Conflict {
                    thread_id: thread_id.to_string(),
                    expected,
                    found: latest,
                });
            }
        }

        let checkpoint = Checkpoint::next(thread_id, latest, state);
        threads
            .entry(thread_id.to_string())
            .or_default()
            .push(checkpoint.clone());
        log::debug!(
            "Saved checkpoint {} for thread {}",
            checkpoint.sequence,
            thread_id
        );
        Ok(checkpoint)
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .and_then(|history| history.last())
            .cloned())
    }

    async fn save(&self, thread_id: &str, state: &State) -> Result<Checkpoint, CheckpointError> {
        self.commit(thread_id, state, None).await
    }

    async fn save_if(
        &self,
        thread_id: &str,
        state: &State,
        expected: Option<u64>,
    ) -> Result<Checkpoint, CheckpointError> {
        self.commit(thread_id, state, Some(expected)).await
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>, CheckpointError> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).cloned().unwrap_or_default())
    }

    async fn threads(&self) -> Result<Vec<String>, CheckpointError> {
        let threads = self.threads.read().await;
        let mut ids: Vec<String> = threads
            .iter()
            .filter(|(_, history)| !history.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
