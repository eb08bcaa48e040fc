use dashmap::DashMap;

use crate::error::Result;
use crate::types::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedulingStatus {
    /// Not yet scheduled, or unknown to the registry.
    Pending,
    Running,
    /// Finished; a recovering dispatcher must not schedule it again.
    Done,
}

/// Tracks whether submitted jobs are running or already done, so a newly
/// elected dispatcher can tell which recovered jobs still need scheduling.
pub trait RunningJobsRegistry: Send + Sync {
    fn set_job_running(&self, job_id: &JobId) -> Result<()>;

    fn set_job_finished(&self, job_id: &JobId) -> Result<()>;

    fn job_scheduling_status(&self, job_id: &JobId) -> Result<JobSchedulingStatus>;

    fn clear_job(&self, job_id: &JobId) -> Result<()>;
}

/// Registry kept in this process's memory.
pub struct StandaloneRunningJobsRegistry {
    statuses: DashMap<JobId, JobSchedulingStatus>,
}

impl Default for StandaloneRunningJobsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StandaloneRunningJobsRegistry {
    pub fn new() -> Self {
        Self {
            statuses: DashMap::new(),
        }
    }
}

impl RunningJobsRegistry for StandaloneRunningJobsRegistry {
    fn set_job_running(&self, job_id: &JobId) -> Result<()> {
        self.statuses.insert(*job_id, JobSchedulingStatus::Running);
        Ok(())
    }

    fn set_job_finished(&self, job_id: &JobId) -> Result<()> {
        self.statuses.insert(*job_id, JobSchedulingStatus::Done);
        Ok(())
    }

    fn job_scheduling_status(&self, job_id: &JobId) -> Result<JobSchedulingStatus> {
        Ok(self
            .statuses
            .get(job_id)
            .map(|status| *status)
            .unwrap_or(JobSchedulingStatus::Pending))
    }

    fn clear_job(&self, job_id: &JobId) -> Result<()> {
        self.statuses.remove(job_id);
        Ok(())
    }
}
