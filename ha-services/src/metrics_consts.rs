/// Counter for embedded leader services created for individual jobs
pub const JOB_LEADER_SERVICES_CREATED: &str = "ha_job_leader_services_created_total";

/// Counter for close/cleanup calls whose blob store teardown failed (label: operation)
pub const CLOSE_FAILURES: &str = "ha_services_close_failures_total";
