//! High-availability services of the control plane.
//!
//! [`HighAvailabilityServices`] is the one place resource managers,
//! dispatchers, job managers and the web monitor get their leader election and
//! retrieval handles from, together with checkpoint recovery, the submitted
//! job graph store, the running jobs registry and the blob store. It runs in
//! one of two modes: local, where every role lives in this process and
//! leadership is decided in memory, or cluster, where every role sits at a
//! fixed address.

pub mod blob;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod job_graph;
pub mod lifecycle;
pub mod metrics_consts;
pub mod registry;
pub mod routing;
pub mod running_jobs;
pub mod services;
pub mod storage;
pub mod types;

pub use config::{Config, Deployment};
pub use error::{Error, Result};
pub use routing::{ClusterAddresses, DeploymentMode, FixedRole};
pub use services::HighAvailabilityServices;
pub use storage::HaStorage;
pub use types::{BlobKey, JobId, JobStatus};
