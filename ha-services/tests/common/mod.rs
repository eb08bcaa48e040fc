#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ha_services::blob::{BlobStore, BlobStoreService};
use ha_services::{BlobKey, ClusterAddresses, Error, HaStorage, HighAvailabilityServices, JobId};
use leader_election::{LeaderContender, LeaderInformation, LeaderRetrievalListener};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

// ── Blob store doubles ──────────────────────────────────────────

/// Blob store that stores nothing and counts close calls, optionally failing them.
#[derive(Default)]
pub struct CountingBlobStore {
    pub fail_close: bool,
    pub closes: AtomicUsize,
    pub cleanups: AtomicUsize,
}

impl CountingBlobStore {
    pub fn failing() -> Self {
        Self {
            fail_close: true,
            ..Default::default()
        }
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    fn outcome(&self) -> ha_services::Result<()> {
        if self.fail_close {
            Err(std::io::Error::other("disk on fire").into())
        } else {
            Ok(())
        }
    }
}

impl BlobStore for CountingBlobStore {
    fn put(&self, _: &std::path::Path, _: Option<&JobId>, _: &BlobKey) -> ha_services::Result<()> {
        Ok(())
    }

    fn get(
        &self,
        _: Option<&JobId>,
        _: &BlobKey,
        _: &std::path::Path,
    ) -> ha_services::Result<bool> {
        Ok(false)
    }

    fn delete(&self, _: Option<&JobId>, _: &BlobKey) -> ha_services::Result<()> {
        Ok(())
    }

    fn delete_all(&self, _: &JobId) -> ha_services::Result<()> {
        Ok(())
    }
}

impl BlobStoreService for CountingBlobStore {
    fn close(&self) -> ha_services::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.outcome()
    }

    fn close_and_cleanup_all_data(&self) -> ha_services::Result<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        self.outcome()
    }
}

// ── Services builders ───────────────────────────────────────────

pub fn cluster_addresses() -> ClusterAddresses {
    ClusterAddresses {
        resource_manager: "rm:6123".to_string(),
        dispatcher: "dispatcher:6123".to_string(),
        job_manager: "jm:6123".to_string(),
        web_monitor: "http://web:8081".to_string(),
    }
}

pub fn local_services(
    storage: &tempfile::TempDir,
    executor: Handle,
) -> (HighAvailabilityServices, Arc<CountingBlobStore>) {
    local_services_with(storage, executor, CountingBlobStore::default())
}

pub fn local_services_with(
    storage: &tempfile::TempDir,
    executor: Handle,
    blob_store: CountingBlobStore,
) -> (HighAvailabilityServices, Arc<CountingBlobStore>) {
    let blob_store = Arc::new(blob_store);
    let services =
        HighAvailabilityServices::local(executor, HaStorage::new(storage.path()), blob_store.clone());
    (services, blob_store)
}

pub fn cluster_services(
    storage: &tempfile::TempDir,
    executor: Handle,
) -> (HighAvailabilityServices, Arc<CountingBlobStore>) {
    let blob_store = Arc::new(CountingBlobStore::default());
    let services = HighAvailabilityServices::cluster(
        cluster_addresses(),
        executor,
        HaStorage::new(storage.path()),
        blob_store.clone(),
    );
    (services, blob_store)
}

pub fn is_shut_down<T>(result: ha_services::Result<T>) -> bool {
    matches!(result, Err(Error::ShutDown))
}

// ── Leader election participants ────────────────────────────────

pub struct RecordingListener {
    tx: mpsc::UnboundedSender<Option<LeaderInformation>>,
}

impl RecordingListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Option<LeaderInformation>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl LeaderRetrievalListener for RecordingListener {
    fn notify_leader_address(&self, leader: Option<LeaderInformation>) {
        drop(self.tx.send(leader));
    }

    fn handle_error(&self, _error: &leader_election::Error) {}
}

pub struct RecordingContender {
    tx: mpsc::UnboundedSender<Uuid>,
}

impl RecordingContender {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Uuid>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl LeaderContender for RecordingContender {
    fn grant_leadership(&self, session_id: Uuid) {
        drop(self.tx.send(session_id));
    }

    fn revoke_leadership(&self) {}

    fn handle_error(&self, _error: &leader_election::Error) {}

    fn description(&self) -> String {
        "recording-contender".to_string()
    }
}

pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notification channel closed")
}
