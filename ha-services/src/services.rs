use std::sync::Arc;

use leader_election::{EmbeddedLeaderService, LeaderElectionService, LeaderRetrievalService};
use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::blob::{BlobStoreService, FileSystemBlobStore};
use crate::checkpoint::{CheckpointRecoveryFactory, FileSystemCheckpointRecoveryFactory};
use crate::config::{Config, Deployment};
use crate::error::{Error, Result};
use crate::job_graph::{FileSystemSubmittedJobGraphStore, SubmittedJobGraphStore};
use crate::lifecycle::Lifecycle;
use crate::metrics_consts::CLOSE_FAILURES;
use crate::routing::{
    ClusterAddresses, ClusterRouting, DeploymentMode, FixedRole, LeaderRouting, LocalRouting,
};
use crate::running_jobs::{RunningJobsRegistry, StandaloneRunningJobsRegistry};
use crate::storage::HaStorage;
use crate::types::JobId;

const CLOSE_FAILED: &str = "could not properly close the high availability services";
const CLEANUP_FAILED: &str =
    "could not properly close and clean up all data of the high availability services";

/// Entry point for everything the control plane needs to survive failover:
/// leader election and retrieval for every role, checkpoint recovery, the
/// submitted job graph store, the running jobs registry and the blob store.
///
/// Leader services are answered by the [`LeaderRouting`] picked at
/// construction. The routing (and with it every per-job leader service) sits
/// inside the shutdown [`Lifecycle`] behind one lock, so once the services are
/// closed no accessor can hand out a handle to torn-down state.
pub struct HighAvailabilityServices {
    mode: DeploymentMode,
    state: Mutex<Lifecycle<Box<dyn LeaderRouting>>>,
    storage: HaStorage,
    executor: Handle,
    running_jobs_registry: Arc<dyn RunningJobsRegistry>,
    blob_store: Arc<dyn BlobStoreService>,
}

impl HighAvailabilityServices {
    /// All roles in this process. The resource manager, dispatcher and web
    /// monitor leader services are created here, before the services are
    /// shared with anyone.
    pub fn local(
        executor: Handle,
        storage: HaStorage,
        blob_store: Arc<dyn BlobStoreService>,
    ) -> Self {
        let routing = LocalRouting::new(&executor);
        Self::with_routing(Box::new(routing), executor, storage, blob_store)
    }

    /// Every role at a fixed address.
    pub fn cluster(
        addresses: ClusterAddresses,
        executor: Handle,
        storage: HaStorage,
        blob_store: Arc<dyn BlobStoreService>,
    ) -> Self {
        let routing = ClusterRouting::new(addresses);
        Self::with_routing(Box::new(routing), executor, storage, blob_store)
    }

    /// Build the services described by `config`, with a file system blob
    /// store under the HA storage directory.
    pub fn from_config(config: &Config, executor: Handle) -> Result<Self> {
        let deployment = config.deployment()?;
        let storage = config.storage();
        let blob_store = Arc::new(FileSystemBlobStore::new(storage.blob_root())?);

        Ok(match deployment {
            Deployment::Local => Self::local(executor, storage, blob_store),
            Deployment::Cluster(addresses) => {
                Self::cluster(addresses, executor, storage, blob_store)
            }
        })
    }

    fn with_routing(
        routing: Box<dyn LeaderRouting>,
        executor: Handle,
        storage: HaStorage,
        blob_store: Arc<dyn BlobStoreService>,
    ) -> Self {
        let mode = routing.mode();
        tracing::info!(
            mode = %mode,
            storage = %storage.root().display(),
            "high availability services started"
        );
        Self {
            mode,
            state: Mutex::new(Lifecycle::new(routing)),
            storage,
            executor,
            running_jobs_registry: Arc::new(StandaloneRunningJobsRegistry::new()),
            blob_store,
        }
    }

    fn route<R>(&self, f: impl FnOnce(&mut Box<dyn LeaderRouting>) -> R) -> Result<R> {
        self.state.lock().with_active(f)
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().is_closed()
    }

    // ── Leader services ─────────────────────────────────────────

    pub fn resource_manager_leader_retriever(&self) -> Result<Box<dyn LeaderRetrievalService>> {
        self.route(|routing| routing.resource_manager_leader_retriever())
    }

    pub fn resource_manager_leader_election_service(
        &self,
    ) -> Result<Box<dyn LeaderElectionService>> {
        self.route(|routing| routing.resource_manager_leader_election_service())
    }

    pub fn dispatcher_leader_retriever(&self) -> Result<Box<dyn LeaderRetrievalService>> {
        self.route(|routing| routing.dispatcher_leader_retriever())
    }

    pub fn dispatcher_leader_election_service(&self) -> Result<Box<dyn LeaderElectionService>> {
        self.route(|routing| routing.dispatcher_leader_election_service())
    }

    pub fn job_manager_leader_retriever(
        &self,
        job_id: &JobId,
    ) -> Result<Box<dyn LeaderRetrievalService>> {
        self.route(|routing| routing.job_manager_leader_retriever(job_id, None))
    }

    /// Like [`job_manager_leader_retriever`](Self::job_manager_leader_retriever),
    /// with the address callers expect the job manager at. Locally the
    /// embedded election decides and the address is not used.
    pub fn job_manager_leader_retriever_with_default(
        &self,
        job_id: &JobId,
        default_address: &str,
    ) -> Result<Box<dyn LeaderRetrievalService>> {
        self.route(|routing| routing.job_manager_leader_retriever(job_id, Some(default_address)))
    }

    pub fn job_manager_leader_election_service(
        &self,
        job_id: &JobId,
    ) -> Result<Box<dyn LeaderElectionService>> {
        self.route(|routing| routing.job_manager_leader_election_service(job_id))
    }

    pub fn web_monitor_leader_retriever(&self) -> Result<Box<dyn LeaderRetrievalService>> {
        self.route(|routing| routing.web_monitor_leader_retriever())
    }

    pub fn web_monitor_leader_election_service(&self) -> Result<Box<dyn LeaderElectionService>> {
        self.route(|routing| routing.web_monitor_leader_election_service())
    }

    // ── Other services ──────────────────────────────────────────

    /// A fresh factory on every call. Does not check the shutdown state; a
    /// factory obtained after close still works against the storage directory.
    pub fn checkpoint_recovery_factory(&self) -> Box<dyn CheckpointRecoveryFactory> {
        Box::new(FileSystemCheckpointRecoveryFactory::new(
            self.storage.clone(),
            self.executor.clone(),
        ))
    }

    pub fn submitted_job_graph_store(&self) -> Result<Box<dyn SubmittedJobGraphStore>> {
        let state = self.state.lock();
        state.assert_active()?;
        Ok(Box::new(FileSystemSubmittedJobGraphStore::new(
            self.storage.clone(),
        )?))
    }

    pub fn running_jobs_registry(&self) -> Result<Arc<dyn RunningJobsRegistry>> {
        self.state.lock().assert_active()?;
        Ok(Arc::clone(&self.running_jobs_registry))
    }

    pub fn blob_store(&self) -> Result<Arc<dyn BlobStoreService>> {
        self.state.lock().assert_active()?;
        Ok(Arc::clone(&self.blob_store))
    }

    // ── Introspection ───────────────────────────────────────────

    /// Embedded leader service of a fixed role. `None` in cluster mode or once
    /// shut down.
    pub fn fixed_leader_service(&self, role: FixedRole) -> Option<Arc<EmbeddedLeaderService>> {
        self.route(|routing| routing.fixed_leader_service(role))
            .ok()
            .flatten()
    }

    /// Embedded leader service of a job, if one was created. Never creates one.
    pub fn job_leader_service(&self, job_id: &JobId) -> Option<Arc<EmbeddedLeaderService>> {
        self.route(|routing| routing.job_leader_service(job_id))
            .ok()
            .flatten()
    }

    pub fn job_leader_service_count(&self) -> usize {
        self.route(|routing| routing.job_leader_service_count())
            .unwrap_or(0)
    }

    // ── Shutdown and cleanup ────────────────────────────────────

    /// Close the blob store and shut the services down. The services are shut
    /// down even if the blob store fails to close; that failure is returned
    /// afterwards.
    pub fn close(&self) -> Result<()> {
        let outcome = self.blob_store.close();
        self.internal_close();
        outcome.map_err(|e| close_failure("close", CLOSE_FAILED, e))
    }

    /// Like [`close`](Self::close), but also erases all data the blob store
    /// has persisted.
    pub fn close_and_cleanup_all_data(&self) -> Result<()> {
        let outcome = self.blob_store.close_and_cleanup_all_data();
        self.internal_close();
        outcome.map_err(|e| close_failure("close_and_cleanup_all_data", CLEANUP_FAILED, e))
    }

    fn internal_close(&self) {
        let mut state = self.state.lock();
        match state.close() {
            Some(mut routing) => {
                routing.shutdown();
                tracing::info!(mode = %self.mode, "high availability services shut down");
            }
            None => tracing::debug!("high availability services already shut down"),
        }
    }
}

fn close_failure(operation: &'static str, message: &'static str, error: Error) -> Error {
    tracing::warn!(operation, error = %error, "{message}");
    metrics::counter!(CLOSE_FAILURES, "operation" => operation).increment(1);
    Error::resource_close(message, error)
}
