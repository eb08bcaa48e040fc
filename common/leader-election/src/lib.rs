//! Leader election and retrieval contracts shared by the control plane, plus
//! the two in-process mechanisms that implement them: an embedded arbiter for
//! single-process deployments and fixed-address services for standalone ones.

pub mod embedded;
pub mod error;
pub mod service;
pub mod standalone;

pub use embedded::{
    EmbeddedLeaderElectionService, EmbeddedLeaderRetrievalService, EmbeddedLeaderService,
};
pub use error::{Error, Result};
pub use service::{
    LeaderContender, LeaderElectionService, LeaderInformation, LeaderRetrievalListener,
    LeaderRetrievalService, DEFAULT_LEADER_ID,
};
pub use standalone::{StandaloneLeaderElectionService, StandaloneLeaderRetrievalService};
