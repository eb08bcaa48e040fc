use std::fs;
use std::io;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{remove_dir_all_if_exists, write_atomic, HaStorage, StorageKey};
use crate::types::JobId;

/// A job graph as submitted to the dispatcher, persisted so it can be recovered
/// by a newly elected dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedJobGraph {
    pub job_id: JobId,
    pub job_name: String,
    /// Opaque serialized graph.
    pub graph: serde_json::Value,
}

pub trait SubmittedJobGraphStore: Send + Sync {
    fn put_job_graph(&self, graph: &SubmittedJobGraph) -> Result<()>;

    /// `None` if no graph was persisted for `job_id`.
    fn recover_job_graph(&self, job_id: &JobId) -> Result<Option<SubmittedJobGraph>>;

    /// Removing a graph that is not there is not an error.
    fn remove_job_graph(&self, job_id: &JobId) -> Result<()>;

    fn job_ids(&self) -> Result<Vec<JobId>>;
}

pub struct FileSystemSubmittedJobGraphStore {
    storage: HaStorage,
}

impl FileSystemSubmittedJobGraphStore {
    pub fn new(storage: HaStorage) -> Result<Self> {
        fs::create_dir_all(storage.path(StorageKey::SubmittedJobGraphsRoot))?;
        Ok(Self { storage })
    }
}

impl SubmittedJobGraphStore for FileSystemSubmittedJobGraphStore {
    fn put_job_graph(&self, graph: &SubmittedJobGraph) -> Result<()> {
        let path = self.storage.path(StorageKey::SubmittedJobGraph(&graph.job_id));
        write_atomic(&path, &serde_json::to_vec(graph)?)?;
        tracing::info!(job_id = %graph.job_id, job_name = %graph.job_name, "stored job graph");
        Ok(())
    }

    fn recover_job_graph(&self, job_id: &JobId) -> Result<Option<SubmittedJobGraph>> {
        let path = self.storage.path(StorageKey::SubmittedJobGraph(job_id));
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_job_graph(&self, job_id: &JobId) -> Result<()> {
        remove_dir_all_if_exists(&self.storage.path(StorageKey::SubmittedJobGraphDir(job_id)))?;
        tracing::info!(job_id = %job_id, "removed job graph");
        Ok(())
    }

    fn job_ids(&self) -> Result<Vec<JobId>> {
        let root = self.storage.path(StorageKey::SubmittedJobGraphsRoot);
        let mut ids = Vec::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            match name.parse::<JobId>() {
                Ok(job_id) if self.storage.path(StorageKey::SubmittedJobGraph(&job_id)).exists() => {
                    ids.push(job_id)
                }
                Ok(_) => {}
                Err(_) => tracing::warn!(entry = %name, "skipping unexpected entry in job graph store"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}
