use super::*;
use crate::application::test_support::InMemoryJobStore;
use crate::domain::DEFAULT_MAX_MESSAGE_LEN;
use crate::port::id_provider::SequentialIdProvider;
use crate::port::time_provider::FixedTimeProvider;
use serde_json::json;

const DOMAIN: &str = "domain-1";

fn setup() -> (Arc<JobLifecycleManager>, Arc<InMemoryJobStore>) {
    setup_with(LifecycleConfig::default())
}

fn setup_with(config: LifecycleConfig) -> (Arc<JobLifecycleManager>, Arc<InMemoryJobStore>) {
    let store = Arc::new(InMemoryJobStore::new());
    let manager = Arc::new(JobLifecycleManager::new(
        store.clone(),
        Arc::new(SequentialIdProvider::default()),
        Arc::new(FixedTimeProvider::new(1_700_000_000_000)),
        config,
    ));
    (manager, store)
}

async fn create(manager: &JobLifecycleManager, expected_tasks: i64) -> String {
    manager
        .create_job(
            DOMAIN,
            CreateJobRequest {
                collector_id: "collector-aws".to_string(),
                expected_tasks,
                params: json!({"secret_id": "secret-1"}),
            },
        )
        .await
        .unwrap()
}

fn domain_err(err: AppError) -> DomainError {
    match err {
        AppError::Domain(e) => e,
        other => panic!("expected domain error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_job() {
    let (manager, _) = setup();
    let job_id = create(&manager, 3).await;

    let job = manager.job(&job_id, DOMAIN).await.unwrap();
    assert_eq!(job_id, "job-1");
    assert_eq!(job.state, JobState::Created);
    assert_eq!(job.total_tasks, 0);
    assert_eq!(job.remained_tasks, 3);
    assert_eq!(job.created_at, 1_700_000_000_000);
    assert_eq!(job.collector_id, "collector-aws");
}

#[tokio::test]
async fn test_create_job_stores_filter_as_filters() {
    let (manager, _) = setup();
    let job_id = manager
        .create_job(
            DOMAIN,
            CreateJobRequest {
                collector_id: "collector-aws".to_string(),
                expected_tasks: 0,
                params: json!({"filter": {"region_name": "us-east-1"}}),
            },
        )
        .await
        .unwrap();

    let job = manager.job(&job_id, DOMAIN).await.unwrap();
    assert!(job.params.get("filter").is_none());
    assert_eq!(
        job.params.get("filters"),
        Some(&json!({"region_name": "us-east-1"}))
    );
}

#[tokio::test]
async fn test_create_job_rejects_invalid_request() {
    let (manager, _) = setup();
    let err = manager
        .create_job(
            DOMAIN,
            CreateJobRequest {
                collector_id: String::new(),
                expected_tasks: 1,
                params: json!({}),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        domain_err(err),
        DomainError::ValidationError(_)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_register_task_no_lost_updates() {
    let (manager, _) = setup();
    let job_id = create(&manager, 0).await;

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..50 {
        let manager = manager.clone();
        let job_id = job_id.clone();
        tasks.spawn(async move { manager.register_task(&job_id, DOMAIN).await.unwrap() });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    let job = manager.job(&job_id, DOMAIN).await.unwrap();
    assert_eq!(job.total_tasks, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_complete_task_finishes_once() {
    let (manager, store) = setup();
    let job_id = create(&manager, 20).await;
    manager.mark_in_progress(&job_id, DOMAIN).await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..20 {
        let manager = manager.clone();
        let job_id = job_id.clone();
        tasks.spawn(async move { manager.complete_task(&job_id, DOMAIN).await.unwrap() });
    }
    let mut zeros = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap() == 0 {
            zeros += 1;
        }
    }

    let job = manager.job(&job_id, DOMAIN).await.unwrap();
    assert_eq!(zeros, 1);
    assert_eq!(job.remained_tasks, 0);
    assert_eq!(job.state, JobState::Finished);
    assert_eq!(store.transitions_to(&job_id, JobState::Finished), 1);
}

#[tokio::test]
async fn test_complete_task_underflow() {
    let (manager, _) = setup();
    let job_id = create(&manager, 0).await;
    manager.mark_in_progress(&job_id, DOMAIN).await.unwrap();

    let err = manager.complete_task(&job_id, DOMAIN).await.unwrap_err();
    assert_eq!(
        domain_err(err),
        DomainError::CounterUnderflow {
            job_id: job_id.clone(),
            field: CounterField::RemainedTasks,
            value: -1,
        }
    );

    let job = manager.job(&job_id, DOMAIN).await.unwrap();
    assert_eq!(job.state, JobState::InProgress);
    // Left negative for inspection
    assert_eq!(job.remained_tasks, -1);
}

#[tokio::test]
async fn test_complete_task_on_created_job_reports_illegal_finish() {
    let (manager, _) = setup();
    let job_id = create(&manager, 1).await;

    let err = manager.complete_task(&job_id, DOMAIN).await.unwrap_err();
    assert!(matches!(
        domain_err(err),
        DomainError::InvalidStateTransition {
            event: JobEvent::MarkFinished,
            state: JobState::Created,
            ..
        }
    ));
    assert_eq!(
        manager.job(&job_id, DOMAIN).await.unwrap().state,
        JobState::Created
    );
}

#[tokio::test]
async fn test_report_error_fails_fast() {
    let (manager, store) = setup();
    let job_id = create(&manager, 2).await;
    manager.mark_in_progress(&job_id, DOMAIN).await.unwrap();

    manager
        .report_error(
            &job_id,
            DOMAIN,
            "ERROR_COLLECTOR_COLLECTING",
            "AccessDenied",
            Some(json!({"resource_type": "inventory.CloudService"})),
        )
        .await
        .unwrap();

    let job = manager.job(&job_id, DOMAIN).await.unwrap();
    assert_eq!(job.state, JobState::Failure);
    assert_eq!(job.errors.len(), 1);
    assert_eq!(job.errors[0].error_code, "ERROR_COLLECTOR_COLLECTING");

    assert_eq!(manager.complete_task(&job_id, DOMAIN).await.unwrap(), 1);
    assert_eq!(manager.complete_task(&job_id, DOMAIN).await.unwrap(), 0);

    let job = manager.job(&job_id, DOMAIN).await.unwrap();
    assert_eq!(job.state, JobState::Failure);
    assert_eq!(store.transitions_to(&job_id, JobState::Finished), 0);
}

#[tokio::test]
async fn test_fan_out_scenario() {
    let (manager, store) = setup();
    let job_id = create(&manager, 3).await;
    manager.mark_in_progress(&job_id, DOMAIN).await.unwrap();

    for expected in 1..=3 {
        assert_eq!(manager.register_task(&job_id, DOMAIN).await.unwrap(), expected);
    }
    assert_eq!(manager.complete_task(&job_id, DOMAIN).await.unwrap(), 2);
    assert_eq!(manager.complete_task(&job_id, DOMAIN).await.unwrap(), 1);

    let job = manager.job(&job_id, DOMAIN).await.unwrap();
    assert_eq!(job.total_tasks, 3);
    assert_eq!(job.remained_tasks, 1);
    assert_eq!(job.state, JobState::InProgress);

    manager
        .report_error(&job_id, DOMAIN, "ERROR_UNKNOWN", "region unreachable", None)
        .await
        .unwrap();
    assert_eq!(
        manager.job(&job_id, DOMAIN).await.unwrap().state,
        JobState::Failure
    );

    assert_eq!(manager.complete_task(&job_id, DOMAIN).await.unwrap(), 0);
    let job = manager.job(&job_id, DOMAIN).await.unwrap();
    assert_eq!(job.state, JobState::Failure);
    assert_eq!(store.transitions_to(&job_id, JobState::Finished), 0);
}

#[tokio::test]
async fn test_report_error_truncates_message() {
    let (manager, _) = setup();
    let job_id = create(&manager, 1).await;

    let long = "e".repeat(DEFAULT_MAX_MESSAGE_LEN * 2);
    manager
        .report_error(&job_id, DOMAIN, "ERROR_UNKNOWN", &long, None)
        .await
        .unwrap();

    let job = manager.job(&job_id, DOMAIN).await.unwrap();
    assert_eq!(job.errors[0].message.chars().count(), DEFAULT_MAX_MESSAGE_LEN);
}

#[tokio::test]
async fn test_error_log_is_bounded_and_append_only() {
    let mut config = LifecycleConfig::default();
    config.error_log.max_entries = 2;
    let (manager, _) = setup_with(config);
    let job_id = create(&manager, 1).await;

    for code in ["E1", "E2", "E3"] {
        manager
            .report_error(&job_id, DOMAIN, code, "failed", None)
            .await
            .unwrap();
    }

    let job = manager.job(&job_id, DOMAIN).await.unwrap();
    let codes: Vec<_> = job.errors.iter().map(|e| e.error_code.as_str()).collect();
    assert_eq!(codes, vec!["E1", "E2"]);
    assert_eq!(job.state, JobState::Failure);
}

#[tokio::test]
async fn test_cancel_is_cooperative() {
    let (manager, _) = setup();
    let job_id = create(&manager, 2).await;
    manager.mark_in_progress(&job_id, DOMAIN).await.unwrap();
    assert!(!manager.is_canceled(&job_id, DOMAIN).await.unwrap());

    assert_eq!(
        manager.mark_canceled(&job_id, DOMAIN).await.unwrap(),
        JobState::Canceled
    );
    assert!(manager.is_canceled(&job_id, DOMAIN).await.unwrap());

    let err = manager.register_task(&job_id, DOMAIN).await.unwrap_err();
    assert_eq!(
        domain_err(err),
        DomainError::AlreadyTerminal {
            job_id: job_id.clone(),
            state: JobState::Canceled,
        }
    );
    assert_eq!(manager.job(&job_id, DOMAIN).await.unwrap().total_tasks, 0);
}

#[tokio::test]
async fn test_illegal_transition_leaves_state() {
    let (manager, store) = setup();
    let job_id = create(&manager, 1).await;
    manager.mark_timeout(&job_id, DOMAIN).await.unwrap();

    let err = manager.mark_in_progress(&job_id, DOMAIN).await.unwrap_err();
    assert!(matches!(
        domain_err(err),
        DomainError::InvalidStateTransition {
            state: JobState::Timeout,
            ..
        }
    ));
    assert_eq!(
        manager.job(&job_id, DOMAIN).await.unwrap().state,
        JobState::Timeout
    );
    assert_eq!(store.transition_count(), 1);
}

#[tokio::test]
async fn test_self_loops_are_idempotent() {
    let (manager, store) = setup();
    let job_id = create(&manager, 1).await;

    manager.mark_in_progress(&job_id, DOMAIN).await.unwrap();
    manager.mark_in_progress(&job_id, DOMAIN).await.unwrap();
    manager.mark_finished(&job_id, DOMAIN).await.unwrap();
    manager.mark_finished(&job_id, DOMAIN).await.unwrap();

    // Only real changes are written
    assert_eq!(store.transition_count(), 2);
}

#[tokio::test]
async fn test_unknown_job_and_foreign_domain_not_found() {
    let (manager, _) = setup();
    let job_id = create(&manager, 1).await;

    assert!(manager
        .register_task("missing", DOMAIN)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(manager
        .complete_task(&job_id, "domain-2")
        .await
        .unwrap_err()
        .is_not_found());
    assert!(manager
        .is_canceled(&job_id, "domain-2")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_lost_race_reevaluates_against_fresh_state() {
    let (manager, store) = setup();
    let job_id = create(&manager, 1).await;
    manager.mark_in_progress(&job_id, DOMAIN).await.unwrap();

    // A concurrent report_error wins the race against mark_finished
    store.interfere_with(vec![JobState::Failure]);
    assert_eq!(
        manager.mark_finished(&job_id, DOMAIN).await.unwrap(),
        JobState::Failure
    );
    assert_eq!(store.transitions_to(&job_id, JobState::Finished), 0);
}

#[tokio::test]
async fn test_transition_gives_up_after_max_attempts() {
    let config = LifecycleConfig {
        max_transition_attempts: 3,
        ..Default::default()
    };
    let (manager, store) = setup_with(config);
    let job_id = create(&manager, 1).await;

    store.interfere_with(vec![JobState::Created, JobState::InProgress, JobState::Created]);
    let err = tokio_test::assert_err!(manager.mark_canceled(&job_id, DOMAIN).await);
    assert!(matches!(err, AppError::Conflict(_)));
}
