//! Layout of the HA storage directory.
//!
//! ```text
//! <root>/checkpointcounter/<job id>/counter
//! <root>/completedCheckpoint/<job id>/checkpoint-<id>.json
//! <root>/submittedJobGraph/<job id>/graph.json
//! <root>/blob/...
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::types::JobId;

/// All paths used inside the HA storage directory.
pub(crate) enum StorageKey<'a> {
    CheckpointCounter(&'a JobId),
    CheckpointCounterDir(&'a JobId),
    CompletedCheckpoint { job_id: &'a JobId, checkpoint_id: u64 },
    CompletedCheckpointsDir(&'a JobId),
    SubmittedJobGraph(&'a JobId),
    SubmittedJobGraphDir(&'a JobId),
    SubmittedJobGraphsRoot,
    BlobRoot,
}

impl StorageKey<'_> {
    fn resolve(&self, root: &Path) -> PathBuf {
        match self {
            StorageKey::CheckpointCounter(job) => {
                root.join("checkpointcounter").join(job.to_string()).join("counter")
            }
            StorageKey::CheckpointCounterDir(job) => {
                root.join("checkpointcounter").join(job.to_string())
            }
            StorageKey::CompletedCheckpoint {
                job_id,
                checkpoint_id,
            } => root
                .join("completedCheckpoint")
                .join(job_id.to_string())
                .join(format!("checkpoint-{checkpoint_id}.json")),
            StorageKey::CompletedCheckpointsDir(job) => {
                root.join("completedCheckpoint").join(job.to_string())
            }
            StorageKey::SubmittedJobGraph(job) => root
                .join("submittedJobGraph")
                .join(job.to_string())
                .join("graph.json"),
            StorageKey::SubmittedJobGraphDir(job) => {
                root.join("submittedJobGraph").join(job.to_string())
            }
            StorageKey::SubmittedJobGraphsRoot => root.join("submittedJobGraph"),
            StorageKey::BlobRoot => root.join("blob"),
        }
    }
}

/// Root of the HA storage directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaStorage {
    root: PathBuf,
}

impl HaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blob_root(&self) -> PathBuf {
        self.path(StorageKey::BlobRoot)
    }

    pub(crate) fn path(&self, key: StorageKey<'_>) -> PathBuf {
        key.resolve(&self.root)
    }
}

/// Write `contents` to `path` through a sibling temp file and a rename, so
/// readers never see a partially written file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = fs::File::create(&tmp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    fs::rename(&tmp, path)
}

/// Remove a file, treating "already gone" as success.
pub(crate) fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Remove a directory tree, treating "already gone" as success.
pub(crate) fn remove_dir_all_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_layout_under_root() {
        let storage = HaStorage::new("/ha");
        let job = JobId::from_bytes([0x0f; 16]);
        let job_dir = job.to_string();

        assert_eq!(
            storage.path(StorageKey::CheckpointCounter(&job)),
            PathBuf::from(format!("/ha/checkpointcounter/{job_dir}/counter"))
        );
        assert_eq!(
            storage.path(StorageKey::CompletedCheckpoint {
                job_id: &job,
                checkpoint_id: 7
            }),
            PathBuf::from(format!("/ha/completedCheckpoint/{job_dir}/checkpoint-7.json"))
        );
        assert_eq!(
            storage.path(StorageKey::SubmittedJobGraph(&job)),
            PathBuf::from(format!("/ha/submittedJobGraph/{job_dir}/graph.json"))
        );
        assert_eq!(storage.blob_root(), PathBuf::from("/ha/blob"));
    }

    #[test]
    fn atomic_write_creates_parents_and_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("file");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join("a").join("b").join("file.tmp").exists());
    }

    #[test]
    fn removing_missing_paths_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_file_if_exists(&dir.path().join("missing")).is_ok());
        assert!(remove_dir_all_if_exists(&dir.path().join("missing-dir")).is_ok());
    }
}
