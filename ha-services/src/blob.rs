use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::storage::{remove_dir_all_if_exists, remove_file_if_exists};
use crate::types::{BlobKey, JobId};

/// Durable storage for blobs (job artifacts, libraries), optionally scoped to a job.
pub trait BlobStore: Send + Sync {
    /// Copy `local_file` into the store under `key`.
    fn put(&self, local_file: &Path, job_id: Option<&JobId>, key: &BlobKey) -> Result<()>;

    /// Copy the blob to `local_file`. Returns `false` if the blob does not exist.
    fn get(&self, job_id: Option<&JobId>, key: &BlobKey, local_file: &Path) -> Result<bool>;

    fn delete(&self, job_id: Option<&JobId>, key: &BlobKey) -> Result<()>;

    /// Delete every blob stored for `job_id`.
    fn delete_all(&self, job_id: &JobId) -> Result<()>;
}

/// A [`BlobStore`] whose owner also controls its lifetime.
///
/// Both close operations must be safe to call more than once.
pub trait BlobStoreService: BlobStore {
    fn close(&self) -> Result<()>;

    /// Close and erase everything the store has persisted.
    fn close_and_cleanup_all_data(&self) -> Result<()>;
}

/// Blob store on a (shared) file system.
///
/// Blobs live at `<base>/job_<job id>/blob_<key>`, or `<base>/no_job/blob_<key>`
/// for blobs without a job.
pub struct FileSystemBlobStore {
    base_path: PathBuf,
}

impl FileSystemBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn job_dir(&self, job_id: Option<&JobId>) -> PathBuf {
        match job_id {
            Some(job_id) => self.base_path.join(format!("job_{job_id}")),
            None => self.base_path.join("no_job"),
        }
    }

    fn blob_path(&self, job_id: Option<&JobId>, key: &BlobKey) -> PathBuf {
        self.job_dir(job_id).join(format!("blob_{key}"))
    }
}

impl BlobStore for FileSystemBlobStore {
    fn put(&self, local_file: &Path, job_id: Option<&JobId>, key: &BlobKey) -> Result<()> {
        let target = self.blob_path(job_id, key);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(local_file, &target)?;
        tracing::debug!(key = %key, path = %target.display(), "stored blob");
        Ok(())
    }

    fn get(&self, job_id: Option<&JobId>, key: &BlobKey, local_file: &Path) -> Result<bool> {
        let source = self.blob_path(job_id, key);
        match fs::copy(&source, local_file) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, job_id: Option<&JobId>, key: &BlobKey) -> Result<()> {
        remove_file_if_exists(&self.blob_path(job_id, key))?;

        // Drop the job directory once its last blob is gone; a concurrent put
        // may have refilled it, in which case the removal fails harmlessly.
        let dir = self.job_dir(job_id);
        if fs::read_dir(&dir).is_ok_and(|mut entries| entries.next().is_none()) {
            drop(fs::remove_dir(&dir));
        }
        Ok(())
    }

    fn delete_all(&self, job_id: &JobId) -> Result<()> {
        remove_dir_all_if_exists(&self.job_dir(Some(job_id)))?;
        Ok(())
    }
}

impl BlobStoreService for FileSystemBlobStore {
    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn close_and_cleanup_all_data(&self) -> Result<()> {
        tracing::info!(path = %self.base_path.display(), "removing all blob store data");
        remove_dir_all_if_exists(&self.base_path)?;
        Ok(())
    }
}
