//! Which mechanism answers a leader service request.
//!
//! The deployment mode is decided once, when the services are built, by
//! choosing one [`LeaderRouting`] implementation: [`LocalRouting`] serves every
//! role from embedded leader services inside this process, [`ClusterRouting`]
//! resolves every role to a fixed, configured address.

mod cluster;
mod local;

pub use cluster::{ClusterAddresses, ClusterRouting};
pub use local::LocalRouting;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use leader_election::{EmbeddedLeaderService, LeaderElectionService, LeaderRetrievalService};

use crate::error::Error;
use crate::types::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    /// Every role runs in this process; election happens in memory.
    Local,
    /// Every role has one fixed network address; no election happens here.
    Cluster,
}

impl FromStr for DeploymentMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "embedded" => Ok(DeploymentMode::Local),
            "cluster" | "standalone" => Ok(DeploymentMode::Cluster),
            other => Err(Error::invalid_config(format!(
                "unknown deployment mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Local => f.write_str("local"),
            DeploymentMode::Cluster => f.write_str("cluster"),
        }
    }
}

/// Roles with a single, process-wide leader service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedRole {
    ResourceManager,
    Dispatcher,
    WebMonitor,
}

/// The eight role accessors of the HA services, answered by one mechanism.
///
/// Job-scoped accessors take `&mut self` because local routing may create the
/// job's leader service on first use.
pub trait LeaderRouting: Send {
    fn mode(&self) -> DeploymentMode;

    fn resource_manager_leader_retriever(&self) -> Box<dyn LeaderRetrievalService>;

    fn resource_manager_leader_election_service(&self) -> Box<dyn LeaderElectionService>;

    fn dispatcher_leader_retriever(&self) -> Box<dyn LeaderRetrievalService>;

    fn dispatcher_leader_election_service(&self) -> Box<dyn LeaderElectionService>;

    /// `default_address` only matters where job manager addresses are not
    /// decided by an in-process election.
    fn job_manager_leader_retriever(
        &mut self,
        job_id: &JobId,
        default_address: Option<&str>,
    ) -> Box<dyn LeaderRetrievalService>;

    fn job_manager_leader_election_service(
        &mut self,
        job_id: &JobId,
    ) -> Box<dyn LeaderElectionService>;

    fn web_monitor_leader_retriever(&self) -> Box<dyn LeaderRetrievalService>;

    fn web_monitor_leader_election_service(&self) -> Box<dyn LeaderElectionService>;

    fn fixed_leader_service(&self, _role: FixedRole) -> Option<Arc<EmbeddedLeaderService>> {
        None
    }

    fn job_leader_service(&self, _job_id: &JobId) -> Option<Arc<EmbeddedLeaderService>> {
        None
    }

    fn job_leader_service_count(&self) -> usize {
        0
    }

    /// Release everything the routing owns. Called once, when the services close.
    fn shutdown(&mut self) {}
}
