use leader_election::{
    LeaderElectionService, LeaderRetrievalService, StandaloneLeaderElectionService,
    StandaloneLeaderRetrievalService,
};

use super::{DeploymentMode, LeaderRouting};
use crate::types::JobId;

/// Fixed addresses of every control plane role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAddresses {
    pub resource_manager: String,
    pub dispatcher: String,
    pub job_manager: String,
    pub web_monitor: String,
}

/// Resolves every role to its configured address. Holds no per-job state.
pub struct ClusterRouting {
    addresses: ClusterAddresses,
}

impl ClusterRouting {
    pub fn new(addresses: ClusterAddresses) -> Self {
        Self { addresses }
    }

    fn retriever(address: &str) -> Box<dyn LeaderRetrievalService> {
        Box::new(StandaloneLeaderRetrievalService::new(address))
    }

    fn election(address: &str) -> Box<dyn LeaderElectionService> {
        Box::new(StandaloneLeaderElectionService::new(address))
    }
}

impl LeaderRouting for ClusterRouting {
    fn mode(&self) -> DeploymentMode {
        DeploymentMode::Cluster
    }

    fn resource_manager_leader_retriever(&self) -> Box<dyn LeaderRetrievalService> {
        Self::retriever(&self.addresses.resource_manager)
    }

    fn resource_manager_leader_election_service(&self) -> Box<dyn LeaderElectionService> {
        Self::election(&self.addresses.resource_manager)
    }

    fn dispatcher_leader_retriever(&self) -> Box<dyn LeaderRetrievalService> {
        Self::retriever(&self.addresses.dispatcher)
    }

    fn dispatcher_leader_election_service(&self) -> Box<dyn LeaderElectionService> {
        Self::election(&self.addresses.dispatcher)
    }

    fn job_manager_leader_retriever(
        &mut self,
        job_id: &JobId,
        default_address: Option<&str>,
    ) -> Box<dyn LeaderRetrievalService> {
        // Addresses are static; a caller supplied default never overrides them.
        if let Some(default_address) = default_address {
            if default_address != self.addresses.job_manager {
                tracing::debug!(
                    job_id = %job_id,
                    default_address,
                    configured = %self.addresses.job_manager,
                    "ignoring default job manager address"
                );
            }
        }
        Self::retriever(&self.addresses.job_manager)
    }

    fn job_manager_leader_election_service(
        &mut self,
        job_id: &JobId,
    ) -> Box<dyn LeaderElectionService> {
        // Every job shares the one configured job manager address.
        tracing::debug!(job_id = %job_id, address = %self.addresses.job_manager, "resolving job manager");
        Self::election(&self.addresses.job_manager)
    }

    fn web_monitor_leader_retriever(&self) -> Box<dyn LeaderRetrievalService> {
        Self::retriever(&self.addresses.web_monitor)
    }

    fn web_monitor_leader_election_service(&self) -> Box<dyn LeaderElectionService> {
        Self::election(&self.addresses.web_monitor)
    }
}
