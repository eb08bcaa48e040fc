//! Checkpoint recovery artifacts kept in the HA storage directory: the
//! completed checkpoints of each job and each job's checkpoint id counter.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::error::Result;
use crate::storage::{
    remove_dir_all_if_exists, remove_file_if_exists, write_atomic, HaStorage, StorageKey,
};
use crate::types::{JobId, JobStatus};

/// First id handed out by a fresh checkpoint id counter.
pub const INITIAL_CHECKPOINT_ID: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedCheckpoint {
    pub job_id: JobId,
    pub checkpoint_id: u64,
    pub timestamp_ms: i64,
    /// Where the checkpoint's metadata lives in durable storage.
    pub external_pointer: String,
}

pub trait CompletedCheckpointStore: Send + Sync {
    /// Load the checkpoints persisted by previous attempts of the job.
    fn recover(&self) -> Result<()>;

    /// Persist `checkpoint`, subsuming the oldest ones beyond the retention limit.
    fn add_checkpoint(&self, checkpoint: CompletedCheckpoint) -> Result<()>;

    fn latest_checkpoint(&self) -> Option<CompletedCheckpoint>;

    /// Retained checkpoints, oldest first.
    fn all_checkpoints(&self) -> Vec<CompletedCheckpoint>;

    fn num_checkpoints(&self) -> usize;

    fn max_retained(&self) -> usize;

    /// Globally terminal jobs lose their checkpoints; others keep them for recovery.
    fn shutdown(&self, status: JobStatus) -> Result<()>;
}

pub trait CheckpointIdCounter: Send + Sync {
    fn start(&self) -> Result<()>;

    fn get_and_increment(&self) -> Result<u64>;

    fn get(&self) -> Result<u64>;

    fn set_count(&self, count: u64) -> Result<()>;

    fn shutdown(&self, status: JobStatus) -> Result<()>;
}

pub trait CheckpointRecoveryFactory: Send + Sync {
    fn create_checkpoint_store(
        &self,
        job_id: &JobId,
        max_retained: usize,
    ) -> Result<Box<dyn CompletedCheckpointStore>>;

    fn create_checkpoint_id_counter(&self, job_id: &JobId) -> Result<Box<dyn CheckpointIdCounter>>;
}

pub struct FileSystemCheckpointRecoveryFactory {
    storage: HaStorage,
    executor: Handle,
}

impl FileSystemCheckpointRecoveryFactory {
    pub fn new(storage: HaStorage, executor: Handle) -> Self {
        Self { storage, executor }
    }
}

impl CheckpointRecoveryFactory for FileSystemCheckpointRecoveryFactory {
    fn create_checkpoint_store(
        &self,
        job_id: &JobId,
        max_retained: usize,
    ) -> Result<Box<dyn CompletedCheckpointStore>> {
        Ok(Box::new(FileSystemCompletedCheckpointStore::new(
            *job_id,
            self.storage.clone(),
            max_retained,
            self.executor.clone(),
        )?))
    }

    fn create_checkpoint_id_counter(&self, job_id: &JobId) -> Result<Box<dyn CheckpointIdCounter>> {
        Ok(Box::new(FileSystemCheckpointIdCounter::new(
            *job_id,
            &self.storage,
        )))
    }
}

pub struct FileSystemCompletedCheckpointStore {
    job_id: JobId,
    storage: HaStorage,
    max_retained: usize,
    executor: Handle,
    checkpoints: Mutex<VecDeque<CompletedCheckpoint>>,
}

impl FileSystemCompletedCheckpointStore {
    pub fn new(
        job_id: JobId,
        storage: HaStorage,
        max_retained: usize,
        executor: Handle,
    ) -> Result<Self> {
        fs::create_dir_all(storage.path(StorageKey::CompletedCheckpointsDir(&job_id)))?;
        Ok(Self {
            job_id,
            storage,
            max_retained: max_retained.max(1),
            executor,
            checkpoints: Mutex::new(VecDeque::new()),
        })
    }

    fn checkpoint_path(&self, checkpoint_id: u64) -> PathBuf {
        self.storage.path(StorageKey::CompletedCheckpoint {
            job_id: &self.job_id,
            checkpoint_id,
        })
    }

    /// Subsumed checkpoint files are removed on the executor's blocking pool.
    fn discard(&self, checkpoint: CompletedCheckpoint) {
        let path = self.checkpoint_path(checkpoint.checkpoint_id);
        let job_id = self.job_id;
        self.executor.spawn_blocking(move || {
            if let Err(e) = remove_file_if_exists(&path) {
                tracing::warn!(
                    job_id = %job_id,
                    checkpoint_id = checkpoint.checkpoint_id,
                    error = %e,
                    "failed to discard subsumed checkpoint"
                );
            }
        });
    }
}

impl CompletedCheckpointStore for FileSystemCompletedCheckpointStore {
    fn recover(&self) -> Result<()> {
        let dir = self.storage.path(StorageKey::CompletedCheckpointsDir(&self.job_id));
        let mut recovered = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_checkpoint = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("checkpoint-") && name.ends_with(".json"));
            if !is_checkpoint {
                continue;
            }
            let checkpoint: CompletedCheckpoint = serde_json::from_slice(&fs::read(&path)?)?;
            recovered.push(checkpoint);
        }
        recovered.sort_by_key(|c| c.checkpoint_id);

        tracing::info!(
            job_id = %self.job_id,
            count = recovered.len(),
            "recovered completed checkpoints"
        );
        *self.checkpoints.lock() = recovered.into();
        Ok(())
    }

    fn add_checkpoint(&self, checkpoint: CompletedCheckpoint) -> Result<()> {
        let path = self.checkpoint_path(checkpoint.checkpoint_id);
        write_atomic(&path, &serde_json::to_vec(&checkpoint)?)?;

        let subsumed: Vec<CompletedCheckpoint> = {
            let mut checkpoints = self.checkpoints.lock();
            // A re-added id shares its file with the retained entry.
            let checkpoint_id = checkpoint.checkpoint_id;
            if let Some(retained) = checkpoints
                .iter_mut()
                .find(|c| c.checkpoint_id == checkpoint_id)
            {
                *retained = checkpoint;
                return Ok(());
            }
            checkpoints.push_back(checkpoint);
            let excess = checkpoints.len().saturating_sub(self.max_retained);
            checkpoints.drain(..excess).collect()
        };
        for old in subsumed {
            self.discard(old);
        }
        Ok(())
    }

    fn latest_checkpoint(&self) -> Option<CompletedCheckpoint> {
        self.checkpoints.lock().back().cloned()
    }

    fn all_checkpoints(&self) -> Vec<CompletedCheckpoint> {
        self.checkpoints.lock().iter().cloned().collect()
    }

    fn num_checkpoints(&self) -> usize {
        self.checkpoints.lock().len()
    }

    fn max_retained(&self) -> usize {
        self.max_retained
    }

    fn shutdown(&self, status: JobStatus) -> Result<()> {
        self.checkpoints.lock().clear();
        if status.is_globally_terminal() {
            tracing::info!(job_id = %self.job_id, ?status, "removing completed checkpoints");
            remove_dir_all_if_exists(
                &self
                    .storage
                    .path(StorageKey::CompletedCheckpointsDir(&self.job_id)),
            )?;
        }
        Ok(())
    }
}

pub struct FileSystemCheckpointIdCounter {
    job_id: JobId,
    counter_path: PathBuf,
    counter_dir: PathBuf,
    // serializes read-modify-write of the counter file
    lock: Mutex<()>,
}

impl FileSystemCheckpointIdCounter {
    pub fn new(job_id: JobId, storage: &HaStorage) -> Self {
        Self {
            job_id,
            counter_path: storage.path(StorageKey::CheckpointCounter(&job_id)),
            counter_dir: storage.path(StorageKey::CheckpointCounterDir(&job_id)),
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<Option<u64>> {
        let contents = match fs::read_to_string(&self.counter_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let count = contents.trim().parse::<u64>().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("corrupt checkpoint counter for job {}: {e}", self.job_id),
            )
        })?;
        Ok(Some(count))
    }

    fn write(&self, count: u64) -> Result<()> {
        write_atomic(&self.counter_path, count.to_string().as_bytes())?;
        Ok(())
    }
}

impl CheckpointIdCounter for FileSystemCheckpointIdCounter {
    fn start(&self) -> Result<()> {
        let _guard = self.lock.lock();
        if self.read()?.is_none() {
            self.write(INITIAL_CHECKPOINT_ID)?;
        }
        Ok(())
    }

    fn get_and_increment(&self) -> Result<u64> {
        let _guard = self.lock.lock();
        let current = self.read()?.unwrap_or(INITIAL_CHECKPOINT_ID);
        let next = current.checked_add(1).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("checkpoint counter for job {} is exhausted", self.job_id),
            )
        })?;
        self.write(next)?;
        Ok(current)
    }

    fn get(&self) -> Result<u64> {
        let _guard = self.lock.lock();
        Ok(self.read()?.unwrap_or(INITIAL_CHECKPOINT_ID))
    }

    fn set_count(&self, count: u64) -> Result<()> {
        let _guard = self.lock.lock();
        self.write(count)
    }

    fn shutdown(&self, status: JobStatus) -> Result<()> {
        if status.is_globally_terminal() {
            let _guard = self.lock.lock();
            tracing::info!(job_id = %self.job_id, ?status, "removing checkpoint id counter");
            remove_dir_all_if_exists(&self.counter_dir)?;
        }
        Ok(())
    }
}
