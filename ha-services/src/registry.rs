use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use leader_election::EmbeddedLeaderService;
use tokio::runtime::Handle;

use crate::metrics_consts::JOB_LEADER_SERVICES_CREATED;
use crate::types::JobId;

/// Embedded leader services of individual jobs, created on first use.
///
/// There is no way to drop a single entry: the registry lives until the
/// owning services are shut down, at which point every entry goes at once.
/// Mutation requires `&mut self`, so callers serialize access through the
/// lock that also guards the shutdown state.
pub struct JobLeaderRegistry {
    executor: Handle,
    services: HashMap<JobId, Arc<EmbeddedLeaderService>>,
}

impl JobLeaderRegistry {
    pub fn new(executor: Handle) -> Self {
        Self {
            executor,
            services: HashMap::new(),
        }
    }

    /// Return the job's leader service, creating it if this is the first request.
    pub fn get_or_create(&mut self, job_id: &JobId) -> Arc<EmbeddedLeaderService> {
        match self.services.entry(*job_id) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                tracing::debug!(job_id = %job_id, "creating embedded leader service for job");
                metrics::counter!(JOB_LEADER_SERVICES_CREATED).increment(1);
                let service = Arc::new(EmbeddedLeaderService::new(&self.executor));
                Arc::clone(entry.insert(service))
            }
        }
    }

    pub fn get(&self, job_id: &JobId) -> Option<Arc<EmbeddedLeaderService>> {
        self.services.get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Shut down and discard every job's leader service.
    pub fn shutdown(&mut self) {
        for (job_id, service) in self.services.drain() {
            tracing::debug!(job_id = %job_id, "shutting down embedded leader service for job");
            service.shutdown();
        }
    }
}
