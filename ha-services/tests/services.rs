mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{
    cluster_services, is_shut_down, local_services, local_services_with, next, CountingBlobStore,
    RecordingContender, RecordingListener,
};
use envconfig::Envconfig;
use ha_services::checkpoint::CompletedCheckpoint;
use ha_services::job_graph::SubmittedJobGraph;
use ha_services::{Config, DeploymentMode, Error, FixedRole, HighAvailabilityServices, JobId, JobStatus};
use leader_election::{LeaderInformation, DEFAULT_LEADER_ID};
use tokio::runtime::Handle;

fn assert_everything_gated(services: &HighAvailabilityServices, job: &JobId) {
    assert!(is_shut_down(services.resource_manager_leader_retriever()));
    assert!(is_shut_down(services.resource_manager_leader_election_service()));
    assert!(is_shut_down(services.dispatcher_leader_retriever()));
    assert!(is_shut_down(services.dispatcher_leader_election_service()));
    assert!(is_shut_down(services.job_manager_leader_retriever(job)));
    assert!(is_shut_down(
        services.job_manager_leader_retriever_with_default(job, "jm:6123")
    ));
    assert!(is_shut_down(services.job_manager_leader_election_service(job)));
    assert!(is_shut_down(services.web_monitor_leader_retriever()));
    assert!(is_shut_down(services.web_monitor_leader_election_service()));
    assert!(is_shut_down(services.submitted_job_graph_store()));
    assert!(is_shut_down(services.running_jobs_registry()));
    assert!(is_shut_down(services.blob_store()));
}

// ── Per-job leader services ─────────────────────────────────────

#[tokio::test]
async fn job_leader_services_are_created_once_per_job() {
    let dir = tempfile::tempdir().unwrap();
    let (services, _) = local_services(&dir, Handle::current());
    let (job_a, job_b) = (JobId::generate(), JobId::generate());

    services.job_manager_leader_retriever(&job_a).unwrap();
    let first = services.job_leader_service(&job_a).unwrap();
    services.job_manager_leader_election_service(&job_a).unwrap();
    services.job_manager_leader_retriever(&job_a).unwrap();
    assert!(Arc::ptr_eq(&first, &services.job_leader_service(&job_a).unwrap()));

    services.job_manager_leader_election_service(&job_b).unwrap();
    let second = services.job_leader_service(&job_b).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(services.job_leader_service_count(), 2);
}

#[tokio::test]
async fn job_election_and_retrieval_share_one_provider() {
    let dir = tempfile::tempdir().unwrap();
    let (services, _) = local_services(&dir, Handle::current());
    let job = JobId::generate();

    let election = services.job_manager_leader_election_service(&job).unwrap();
    let retriever = services.job_manager_leader_retriever(&job).unwrap();
    let (contender, mut grants) = RecordingContender::new();
    let (listener, mut leaders) = RecordingListener::new();

    retriever.start(listener).unwrap();
    election.start(contender).unwrap();
    let session_id = next(&mut grants).await;
    election.confirm_leadership(session_id, "jm-1:6123");

    assert_eq!(
        next(&mut leaders).await,
        Some(LeaderInformation {
            session_id,
            address: "jm-1:6123".to_string(),
        })
    );
    assert!(election.has_leadership(session_id));
}

// ── Fixed roles ─────────────────────────────────────────────────

#[tokio::test]
async fn local_fixed_roles_are_backed_by_one_provider_each() {
    let dir = tempfile::tempdir().unwrap();
    let (services, _) = local_services(&dir, Handle::current());

    let before = services.fixed_leader_service(FixedRole::ResourceManager).unwrap();
    let election = services.resource_manager_leader_election_service().unwrap();
    let (first_listener, mut first) = RecordingListener::new();
    let (second_listener, mut second) = RecordingListener::new();
    services
        .resource_manager_leader_retriever()
        .unwrap()
        .start(first_listener)
        .unwrap();
    services
        .resource_manager_leader_retriever()
        .unwrap()
        .start(second_listener)
        .unwrap();

    let (contender, mut grants) = RecordingContender::new();
    election.start(contender).unwrap();
    let session_id = next(&mut grants).await;
    election.confirm_leadership(session_id, "rm-1:6123");

    let expected = Some(LeaderInformation {
        session_id,
        address: "rm-1:6123".to_string(),
    });
    assert_eq!(next(&mut first).await, expected);
    assert_eq!(next(&mut second).await, expected);

    let after = services.fixed_leader_service(FixedRole::ResourceManager).unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.current_leader(), expected);

    let dispatcher = services.fixed_leader_service(FixedRole::Dispatcher).unwrap();
    assert!(!Arc::ptr_eq(&before, &dispatcher));
    assert_eq!(dispatcher.current_leader(), None);
}

// ── Cluster mode ────────────────────────────────────────────────

#[tokio::test]
async fn cluster_roles_resolve_to_fixed_addresses() {
    let dir = tempfile::tempdir().unwrap();
    let (services, _) = cluster_services(&dir, Handle::current());
    let job = JobId::generate();
    assert_eq!(services.mode(), DeploymentMode::Cluster);

    let (contender, mut grants) = RecordingContender::new();
    let election = services.job_manager_leader_election_service(&job).unwrap();
    election.start(contender).unwrap();
    assert_eq!(next(&mut grants).await, DEFAULT_LEADER_ID);
    assert!(election.has_leadership(DEFAULT_LEADER_ID));

    let cases = [
        (services.resource_manager_leader_retriever().unwrap(), "rm:6123"),
        (services.dispatcher_leader_retriever().unwrap(), "dispatcher:6123"),
        (services.job_manager_leader_retriever(&job).unwrap(), "jm:6123"),
        (
            services
                .job_manager_leader_retriever_with_default(&job, "elsewhere:1")
                .unwrap(),
            "jm:6123",
        ),
        (services.web_monitor_leader_retriever().unwrap(), "http://web:8081"),
    ];
    for (retriever, address) in cases {
        let (listener, mut leaders) = RecordingListener::new();
        retriever.start(listener).unwrap();
        assert_eq!(
            next(&mut leaders).await,
            Some(LeaderInformation {
                session_id: DEFAULT_LEADER_ID,
                address: address.to_string(),
            })
        );
    }

    assert_eq!(services.job_leader_service_count(), 0);
    assert!(services.job_leader_service(&job).is_none());
    assert!(services.fixed_leader_service(FixedRole::Dispatcher).is_none());
}

// ── Shutdown ────────────────────────────────────────────────────

#[tokio::test]
async fn close_gates_every_accessor() {
    for mode in [DeploymentMode::Local, DeploymentMode::Cluster] {
        let dir = tempfile::tempdir().unwrap();
        let (services, blob_store) = match mode {
            DeploymentMode::Local => local_services(&dir, Handle::current()),
            DeploymentMode::Cluster => cluster_services(&dir, Handle::current()),
        };

        services.close().unwrap();

        assert!(services.is_shut_down());
        assert_everything_gated(&services, &JobId::generate());
        assert_eq!(blob_store.closes(), 1);
        assert_eq!(blob_store.cleanups(), 0);
    }
}

#[tokio::test]
async fn close_and_cleanup_gates_every_accessor() {
    let dir = tempfile::tempdir().unwrap();
    let (services, blob_store) = local_services(&dir, Handle::current());

    services.close_and_cleanup_all_data().unwrap();

    assert_everything_gated(&services, &JobId::generate());
    assert_eq!(blob_store.cleanups(), 1);
    assert_eq!(blob_store.closes(), 0);
}

#[tokio::test]
async fn closing_twice_is_harmless() {
    let dir = tempfile::tempdir().unwrap();
    let (services, _) = local_services(&dir, Handle::current());

    services.close().unwrap();
    services.close().unwrap();
    services.close_and_cleanup_all_data().unwrap();
    assert!(services.is_shut_down());
}

#[tokio::test]
async fn close_shuts_down_every_embedded_leader_service() {
    let dir = tempfile::tempdir().unwrap();
    let (services, _) = local_services(&dir, Handle::current());
    let job = JobId::generate();
    services.job_manager_leader_retriever(&job).unwrap();

    let job_service = services.job_leader_service(&job).unwrap();
    let fixed: Vec<_> = [
        FixedRole::ResourceManager,
        FixedRole::Dispatcher,
        FixedRole::WebMonitor,
    ]
    .into_iter()
    .map(|role| services.fixed_leader_service(role).unwrap())
    .collect();

    services.close().unwrap();

    assert!(job_service.is_shutdown());
    assert!(fixed.iter().all(|s| s.is_shutdown()));
    assert!(services.job_leader_service(&job).is_none());
    assert!(services.fixed_leader_service(FixedRole::Dispatcher).is_none());
    assert_eq!(services.job_leader_service_count(), 0);
}

#[tokio::test]
async fn failing_blob_store_close_still_shuts_down() {
    let dir = tempfile::tempdir().unwrap();
    let (services, blob_store) =
        local_services_with(&dir, Handle::current(), CountingBlobStore::failing());

    let err = services.close().unwrap_err();
    assert!(matches!(err, Error::ResourceClose { .. }), "{err}");
    assert!(services.is_shut_down());
    assert!(is_shut_down(services.dispatcher_leader_retriever()));

    // The blob store is asked again on every close.
    assert!(services.close_and_cleanup_all_data().is_err());
    assert_eq!(blob_store.closes(), 1);
    assert_eq!(blob_store.cleanups(), 1);
}

#[tokio::test]
async fn job_handles_obtained_before_close_observe_the_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let (services, _) = local_services(&dir, Handle::current());
    let job_a = JobId::generate();

    services.job_manager_leader_retriever(&job_a).unwrap();
    assert!(services.job_leader_service(&job_a).is_some());
    let election = services.job_manager_leader_election_service(&job_a).unwrap();

    services.close().unwrap();

    assert!(is_shut_down(services.job_manager_leader_election_service(&job_a)));
    let (contender, _grants) = RecordingContender::new();
    assert_eq!(
        election.start(contender),
        Err(leader_election::Error::ServiceShutDown)
    );
}

// ── Other services ──────────────────────────────────────────────

#[tokio::test]
async fn checkpoint_recovery_survives_close() {
    let dir = tempfile::tempdir().unwrap();
    let (services, _) = local_services(&dir, Handle::current());
    let job = JobId::generate();

    services.close().unwrap();

    let factory = services.checkpoint_recovery_factory();
    let counter = factory.create_checkpoint_id_counter(&job).unwrap();
    assert_eq!(counter.get_and_increment().unwrap(), 1);
    assert_eq!(counter.get().unwrap(), 2);

    let store = factory.create_checkpoint_store(&job, 1).unwrap();
    store
        .add_checkpoint(CompletedCheckpoint {
            job_id: job,
            checkpoint_id: 1,
            timestamp_ms: 1_700_000_000_000,
            external_pointer: "s3://checkpoints/1".to_string(),
        })
        .unwrap();
    assert_eq!(store.latest_checkpoint().map(|c| c.checkpoint_id), Some(1));
    store.shutdown(JobStatus::Finished).unwrap();
}

#[tokio::test]
async fn stores_share_state_across_accessor_calls() {
    let dir = tempfile::tempdir().unwrap();
    let (services, _) = local_services(&dir, Handle::current());
    let job = JobId::generate();

    services
        .submitted_job_graph_store()
        .unwrap()
        .put_job_graph(&SubmittedJobGraph {
            job_id: job,
            job_name: "word-count".to_string(),
            graph: serde_json::json!({}),
        })
        .unwrap();
    assert_eq!(
        services.submitted_job_graph_store().unwrap().job_ids().unwrap(),
        vec![job]
    );

    services.running_jobs_registry().unwrap().set_job_running(&job).unwrap();
    assert_eq!(
        services
            .running_jobs_registry()
            .unwrap()
            .job_scheduling_status(&job)
            .unwrap(),
        ha_services::running_jobs::JobSchedulingStatus::Running
    );
}

// ── Construction from configuration ─────────────────────────────

fn config(vars: &[(&str, &str)]) -> Config {
    let env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::init_from_hashmap(&env).unwrap()
}

#[tokio::test]
async fn from_config_builds_local_services() {
    let dir = tempfile::tempdir().unwrap();
    let storage = dir.path().join("ha");
    let config = config(&[("HA_STORAGE_DIR", storage.to_str().unwrap())]);

    let services = HighAvailabilityServices::from_config(&config, Handle::current()).unwrap();

    assert_eq!(services.mode(), DeploymentMode::Local);
    assert!(services.fixed_leader_service(FixedRole::WebMonitor).is_some());
    assert!(storage.join("blob").is_dir());

    services.close_and_cleanup_all_data().unwrap();
    assert!(!storage.join("blob").exists());
}

#[tokio::test]
async fn from_config_builds_cluster_services() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&[
        ("HA_DEPLOYMENT_MODE", "cluster"),
        ("HA_STORAGE_DIR", dir.path().to_str().unwrap()),
        ("HA_RESOURCE_MANAGER_ADDRESS", "rm:6123"),
        ("HA_DISPATCHER_ADDRESS", "dispatcher:6123"),
        ("HA_JOB_MANAGER_ADDRESS", "jm:6123"),
        ("HA_WEB_MONITOR_ADDRESS", "http://web:8081"),
    ]);

    let services = HighAvailabilityServices::from_config(&config, Handle::current()).unwrap();

    assert_eq!(services.mode(), DeploymentMode::Cluster);
    let (listener, mut leaders) = RecordingListener::new();
    services
        .dispatcher_leader_retriever()
        .unwrap()
        .start(listener)
        .unwrap();
    assert_eq!(
        next(&mut leaders).await.map(|l| l.address),
        Some("dispatcher:6123".to_string())
    );
}

#[tokio::test]
async fn from_config_rejects_incomplete_cluster_settings() {
    let config = config(&[
        ("HA_DEPLOYMENT_MODE", "cluster"),
        ("HA_DISPATCHER_ADDRESS", "dispatcher:6123"),
    ]);

    let result = HighAvailabilityServices::from_config(&config, Handle::current());
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
