// SPDX-License-Identifier: MIT

//! File-system backed checkpoint store
//!
//! Layout:
//! ```text
//! {root}/thread-{hex(thread_id)}/{sequence}.json
//! {root}/thread-{hex[..200]}/~{hex[200..400]}/.../{sequence}.json
//! ```
//!
//! Thread ids are hex-encoded so any string is a safe directory name. Long
//! encodings are split into nested segments to stay under file-name limits;
//! continuation segments start with `~`, which hex never contains.
//! Snapshots are written to a temp file and renamed into place, so a crash
//! never leaves a half-written snapshot under its final name.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{Checkpoint, CheckpointStore};
use crate::adk::error::CheckpointError;
use crate::kinetic::workflow::state::State;

const THREAD_DIR_PREFIX: &str = "thread-";
const SEGMENT_PREFIX: char = '~';
const SEGMENT_LEN: usize = 200;

pub struct FileCheckpointStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            CheckpointError::Storage(format!(
                "failed to create checkpoint directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn thread_dir(&self, thread_id: &str) -> PathBuf {
        let encoded = encode_thread_id(thread_id);
        let mut segments = encoded.as_bytes().chunks(SEGMENT_LEN);
        // hex is ASCII, so the lossy conversion never substitutes
        let first = segments
            .next()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .unwrap_or_default();

        let mut dir = self.root.join(format!("{}{}", THREAD_DIR_PREFIX, first));
        for segment in segments {
            dir.push(format!("{}{}", SEGMENT_PREFIX, String::from_utf8_lossy(segment)));
        }
        dir
    }

    /// Sequence numbers on disk for a thread, ascending
    async fn sequences(&self, thread_id: &str) -> Result<Vec<u64>, CheckpointError> {
        let dir = self.thread_dir(thread_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sequences = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(seq) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                sequences.push(seq);
            }
        }
        sequences.sort_unstable();
        Ok(sequences)
    }

    async fn read(&self, thread_id: &str, sequence: u64) -> Result<Checkpoint, CheckpointError> {
        let path = self.thread_dir(thread_id).join(format!("{}.json", sequence));
        let data = tokio::fs::read(&path).await?;
        let checkpoint: Checkpoint =
            serde_json::from_slice(&data).map_err(|e| CheckpointError::Corrupt {
                thread_id: thread_id.to_string(),
                reason: format!("{}: {}", path.display(), e),
            })?;

        if checkpoint.thread_id != thread_id || checkpoint.sequence != sequence {
            return Err(CheckpointError::Corrupt {
                thread_id: thread_id.to_string(),
                reason: format!(
                    "{} holds thread '{}' sequence {}",
                    path.display(),
                    checkpoint.thread_id,
                    checkpoint.sequence
                ),
            });
        }
        Ok(checkpoint)
    }

    async fn commit(
        &self,
        thread_id: &str,
        state: &State,
        expected: Option<Option<u64>>,
    ) -> Result<Checkpoint, CheckpointError> {
        let _guard = self.write_lock.lock().await;

        let latest = self.sequences(thread_id).await?.last().copied();
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
        let dir = self.thread_dir(thread_id);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(format!("{}.json", checkpoint.sequence));
        let data = serde_json::to_vec_pretty(&checkpoint)?;
        atomic_write(&path, &data).await?;

        log::debug!(
            "Wrote checkpoint {} for thread {} to {}",
            checkpoint.sequence,
            thread_id,
            path.display()
        );
        Ok(checkpoint)
    }
}

/// Write to a sibling temp file, then rename over the target
async fn atomic_write(path: &Path, data: &[u8]) -> Result<(), CheckpointError> {
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, data).await?;
    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

fn encode_thread_id(thread_id: &str) -> String {
    thread_id.bytes().map(|b| format!("{:02x}", b)).collect()
}

fn decode_thread_id(encoded: &str) -> Option<String> {
    if encoded.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..encoded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(encoded.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        match self.sequences(thread_id).await?.last() {
            Some(&latest) => Ok(Some(self.read(thread_id, latest).await?)),
            None => Ok(None),
        }
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
        let mut history = Vec::new();
        for sequence in self.sequences(thread_id).await? {
            history.push(self.read(thread_id, sequence).await?);
        }
        Ok(history)
    }

    async fn threads(&self) -> Result<Vec<String>, CheckpointError> {
        // (directory, hex accumulated along its path)
        let mut pending: Vec<(PathBuf, String)> = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            match name.to_str().and_then(|n| n.strip_prefix(THREAD_DIR_PREFIX)) {
                Some(hex) => pending.push((entry.path(), hex.to_string())),
                None => log::warn!("Skipping unrecognised checkpoint directory {:?}", name),
            }
        }

        let mut threads = Vec::new();
        while let Some((dir, hex)) = pending.pop() {
            let mut has_snapshots = false;
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                if entry.file_type().await?.is_dir() {
                    if let Some(segment) = name.strip_prefix(SEGMENT_PREFIX) {
                        pending.push((entry.path(), format!("{}{}", hex, segment)));
                    }
                } else if name.ends_with(".json") {
                    has_snapshots = true;
                }
            }
            if !has_snapshots {
                continue;
            }
            let Some(thread_id) = decode_thread_id(&hex) else {
                log::warn!("Skipping unrecognised checkpoint directory {}", dir.display());
                continue;
            };
            if !self.sequences(&thread_id).await?.is_empty() {
                threads.push(thread_id);
            }
        }
        threads.sort();
        Ok(threads)
    }
}
