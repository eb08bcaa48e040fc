use std::sync::Arc;

use leader_election::{EmbeddedLeaderService, LeaderElectionService, LeaderRetrievalService};
use tokio::runtime::Handle;

use super::{DeploymentMode, FixedRole, LeaderRouting};
use crate::registry::JobLeaderRegistry;
use crate::types::JobId;

/// Serves every role from embedded leader services living in this process.
///
/// The resource manager, dispatcher and web monitor services are created here,
/// once; job manager services are created per job on first request.
pub struct LocalRouting {
    resource_manager: Arc<EmbeddedLeaderService>,
    dispatcher: Arc<EmbeddedLeaderService>,
    web_monitor: Arc<EmbeddedLeaderService>,
    jobs: JobLeaderRegistry,
}

impl LocalRouting {
    pub fn new(executor: &Handle) -> Self {
        Self {
            resource_manager: Arc::new(EmbeddedLeaderService::new(executor)),
            dispatcher: Arc::new(EmbeddedLeaderService::new(executor)),
            web_monitor: Arc::new(EmbeddedLeaderService::new(executor)),
            jobs: JobLeaderRegistry::new(executor.clone()),
        }
    }

    fn fixed(&self, role: FixedRole) -> &Arc<EmbeddedLeaderService> {
        match role {
            FixedRole::ResourceManager => &self.resource_manager,
            FixedRole::Dispatcher => &self.dispatcher,
            FixedRole::WebMonitor => &self.web_monitor,
        }
    }

    fn retriever(&self, role: FixedRole) -> Box<dyn LeaderRetrievalService> {
        Box::new(self.fixed(role).create_leader_retrieval_service())
    }

    fn election(&self, role: FixedRole) -> Box<dyn LeaderElectionService> {
        Box::new(self.fixed(role).create_leader_election_service())
    }
}

impl LeaderRouting for LocalRouting {
    fn mode(&self) -> DeploymentMode {
        DeploymentMode::Local
    }

    fn resource_manager_leader_retriever(&self) -> Box<dyn LeaderRetrievalService> {
        self.retriever(FixedRole::ResourceManager)
    }

    fn resource_manager_leader_election_service(&self) -> Box<dyn LeaderElectionService> {
        self.election(FixedRole::ResourceManager)
    }

    fn dispatcher_leader_retriever(&self) -> Box<dyn LeaderRetrievalService> {
        self.retriever(FixedRole::Dispatcher)
    }

    fn dispatcher_leader_election_service(&self) -> Box<dyn LeaderElectionService> {
        self.election(FixedRole::Dispatcher)
    }

    fn job_manager_leader_retriever(
        &mut self,
        job_id: &JobId,
        _default_address: Option<&str>,
    ) -> Box<dyn LeaderRetrievalService> {
        Box::new(
            self.jobs
                .get_or_create(job_id)
                .create_leader_retrieval_service(),
        )
    }

    fn job_manager_leader_election_service(
        &mut self,
        job_id: &JobId,
    ) -> Box<dyn LeaderElectionService> {
        Box::new(self.jobs.get_or_create(job_id).create_leader_election_service())
    }

    fn web_monitor_leader_retriever(&self) -> Box<dyn LeaderRetrievalService> {
        self.retriever(FixedRole::WebMonitor)
    }

    fn web_monitor_leader_election_service(&self) -> Box<dyn LeaderElectionService> {
        self.election(FixedRole::WebMonitor)
    }

    fn fixed_leader_service(&self, role: FixedRole) -> Option<Arc<EmbeddedLeaderService>> {
        Some(Arc::clone(self.fixed(role)))
    }

    fn job_leader_service(&self, job_id: &JobId) -> Option<Arc<EmbeddedLeaderService>> {
        self.jobs.get(job_id)
    }

    fn job_leader_service_count(&self) -> usize {
        self.jobs.len()
    }

    fn shutdown(&mut self) {
        self.resource_manager.shutdown();
        self.dispatcher.shutdown();
        self.web_monitor.shutdown();
        self.jobs.shutdown();
    }
}
