mod common;
use crate::common::{init_tracing, policy, ConfigBuilder, FakeAgent, Harness, StartOptionsBuilder, DEPLOYMENT, INSTANCE_ID};

use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::time::Instant;

use backup_supervisor::agent::{AgentError, LogLine};
use backup_supervisor::errors::SupervisorError;
use backup_supervisor::operation::OperationState;
use backup_supervisor::orchestrator::{PollOptions, PollOutcome};
use backup_supervisor::store::{ResourceKey, ResourceStore, StatusPatch};
use backup_supervisor::types::{BackoffStrategyKind, OperationKind};

fn key() -> ResourceKey {
    ResourceKey::new(OperationKind::Backup, INSTANCE_ID)
}

fn poll_opts() -> PollOptions {
    PollOptions::new(DEPLOYMENT, INSTANCE_ID)
}

async fn started(config: backup_supervisor::config::ConfigFile) -> Harness {
    let h = Harness::new(config);
    h.orchestrator
        .start(StartOptionsBuilder::new("op-1").build())
        .await
        .unwrap();
    h
}

#[tokio::test(start_paused = true)]
async fn succeeded_operation_is_persisted_once_with_logs_and_description() {
    init_tracing();
    let h = started(ConfigBuilder::new().build()).await;
    let finished_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    h.agent.push_state(OperationState::InProgress, Some("snapshot"));
    h.agent.push_finished(OperationState::Succeeded, finished_at);
    h.agent.set_logs(vec![
        LogLine::stdout("uploading chunk 1"),
        LogLine::stderr("warning: slow disk"),
        LogLine::stdout("done"),
    ]);

    let outcome = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap();

    let PollOutcome::Finished {
        state,
        description,
        record,
    } = outcome
    else {
        panic!("expected a finished outcome");
    };
    assert_eq!(state, OperationState::Succeeded);
    assert_eq!(
        description,
        format!("Backup deployment {DEPLOYMENT} succeeded at 2024-01-02T03:04:05.000Z")
    );
    assert_eq!(record.finished_at, Some(finished_at));
    assert_eq!(record.logs.stdout, vec!["uploading chunk 1", "done"]);
    assert_eq!(record.logs.stderr, vec!["warning: slow disk"]);
    assert!(!record.truncated.stdout && !record.truncated.stderr);

    assert_eq!(FakeAgent::count(&h.agent.status_calls), 2);
    assert_eq!(FakeAgent::count(&h.agent.logs_calls), 1);
    // One write for start, one for the terminal state.
    assert_eq!(h.store.patch_count(), 2);
    assert_eq!(h.store.get(&key()).await.unwrap(), record);
}

#[tokio::test(start_paused = true)]
async fn terminal_record_short_circuits_later_polls() {
    init_tracing();
    let h = started(ConfigBuilder::new().build()).await;
    h.agent.push_state(OperationState::Succeeded, None);

    let first = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap();
    let second = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(FakeAgent::count(&h.agent.status_calls), 1);
    assert_eq!(FakeAgent::count(&h.agent.logs_calls), 1);
    assert_eq!(h.store.patch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn timeout_while_running_returns_in_progress() {
    init_tracing();
    let h = started(ConfigBuilder::new().build()).await;
    h.agent.push_state(OperationState::InProgress, Some("uploading"));
    let begun = Instant::now();

    let outcome = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap();

    assert_eq!(begun.elapsed(), Duration::from_secs(1));
    match &outcome {
        PollOutcome::InProgress {
            stage, description, ..
        } => {
            assert_eq!(stage.as_deref(), Some("uploading"));
            assert!(description.contains("still in progress"));
            assert!(description.contains(DEPLOYMENT));
        }
        other => panic!("expected in-progress outcome, got {other:?}"),
    }
    assert!(!outcome.is_terminal());

    let stored = h.store.get(&key()).await.unwrap();
    assert_eq!(stored.state, OperationState::InProgress);
    assert_eq!(stored.stage.as_deref(), Some("uploading"));
    assert_eq!(FakeAgent::count(&h.agent.logs_calls), 0);
}

#[tokio::test(start_paused = true)]
async fn caller_timeout_overrides_configured_timeout() {
    init_tracing();
    let h = started(ConfigBuilder::new().build()).await;
    let begun = Instant::now();

    let outcome = h
        .orchestrator
        .get_operation_state(
            OperationKind::Backup,
            poll_opts().with_timeout(Duration::from_millis(250)),
        )
        .await
        .unwrap();

    assert!(!outcome.is_terminal());
    assert_eq!(begun.elapsed(), Duration::from_millis(250));
    // Polls at 0, 100, 200 and the 250ms deadline.
    assert_eq!(FakeAgent::count(&h.agent.status_calls), 4);
}

#[tokio::test(start_paused = true)]
async fn unreachable_agent_for_whole_timeout_is_an_error() {
    init_tracing();
    let h = started(ConfigBuilder::new().build()).await;
    h.agent
        .push_status(Err(AgentError::Unreachable("no route to host".into())));

    let err = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap_err();

    match err {
        SupervisorError::RetryExhausted { last_error, .. } => {
            let last = last_error.unwrap();
            assert!(last.contains("op-1"));
            assert!(last.contains("no route to host"));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    let stored = h.store.get(&key()).await.unwrap();
    assert_eq!(stored.state, OperationState::InProgress);
}

#[tokio::test(start_paused = true)]
async fn agent_blip_then_completion_succeeds() {
    init_tracing();
    let h = started(ConfigBuilder::new().build()).await;
    h.agent
        .push_status(Err(AgentError::Unreachable("reset".into())));
    h.agent.push_state(OperationState::Failed, None);

    let outcome = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap();

    assert_eq!(outcome.state(), OperationState::Failed);
    assert!(outcome.description().contains("failed at"));
}

#[tokio::test(start_paused = true)]
async fn blip_on_final_attempt_still_reports_in_progress() {
    init_tracing();
    let h = started(ConfigBuilder::new().build()).await;
    for _ in 0..8 {
        h.agent.push_state(OperationState::InProgress, Some("uploading"));
    }
    h.agent
        .push_status(Err(AgentError::Unreachable("blip".into())));

    let outcome = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap();

    match outcome {
        PollOutcome::InProgress { stage, record, .. } => {
            assert_eq!(stage.as_deref(), Some("uploading"));
            assert_eq!(record.state, OperationState::InProgress);
        }
        other => panic!("expected in-progress outcome, got {other:?}"),
    }
    assert_eq!(FakeAgent::count(&h.agent.status_calls), 11);
}

#[tokio::test(start_paused = true)]
async fn unchanged_refresh_is_not_written_again() {
    init_tracing();
    let h = started(ConfigBuilder::new().build()).await;
    h.agent.push_state(OperationState::InProgress, Some("uploading"));
    let opts = poll_opts().with_timeout(Duration::from_millis(200));

    h.orchestrator
        .get_operation_state(OperationKind::Backup, opts.clone())
        .await
        .unwrap();
    assert_eq!(h.store.patch_count(), 2);

    for _ in 0..3 {
        let outcome = h
            .orchestrator
            .get_operation_state(OperationKind::Backup, opts.clone())
            .await
            .unwrap();
        assert!(!outcome.is_terminal());
    }
    assert_eq!(h.store.patch_count(), 2);

    h.agent.push_state(OperationState::InProgress, Some("verifying"));
    h.orchestrator
        .get_operation_state(OperationKind::Backup, opts)
        .await
        .unwrap();
    assert_eq!(h.store.patch_count(), 3);
    let stored = h.store.get(&key()).await.unwrap();
    assert_eq!(stored.stage.as_deref(), Some("verifying"));
}

#[tokio::test(start_paused = true)]
async fn transient_log_fetch_errors_are_retried() {
    init_tracing();
    let h = started(ConfigBuilder::new().build()).await;
    h.agent.push_state(OperationState::Succeeded, None);
    h.agent.fail_logs([
        AgentError::Unreachable("reset".into()),
        AgentError::Unreachable("reset".into()),
    ]);
    h.agent.set_logs(vec![LogLine::stdout("done")]);

    let outcome = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap();

    let PollOutcome::Finished { state, record, .. } = outcome else {
        panic!("expected a finished outcome");
    };
    assert_eq!(state, OperationState::Succeeded);
    assert_eq!(record.logs.stdout, vec!["done"]);
    assert_eq!(FakeAgent::count(&h.agent.logs_calls), 3);
    assert_eq!(h.store.get(&key()).await.unwrap(), record);
}

#[tokio::test(start_paused = true)]
async fn log_fetch_outage_leaves_record_for_next_poll() {
    init_tracing();
    let h = started(ConfigBuilder::new().build()).await;
    h.agent.push_state(OperationState::Succeeded, None);
    h.agent
        .fail_logs((0..3).map(|_| AgentError::Unreachable("down".into())));

    let err = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap_err();

    assert!(matches!(err, SupervisorError::AgentUnreachable { .. }), "{err:?}");
    assert_eq!(FakeAgent::count(&h.agent.logs_calls), 3);
    let stored = h.store.get(&key()).await.unwrap();
    assert_eq!(stored.state, OperationState::InProgress);

    let outcome = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap();
    assert_eq!(outcome.state(), OperationState::Succeeded);
    assert_eq!(FakeAgent::count(&h.agent.logs_calls), 4);
}

#[tokio::test(start_paused = true)]
async fn protocol_error_propagates_immediately() {
    init_tracing();
    let h = started(ConfigBuilder::new().build()).await;
    h.agent
        .push_status(Err(AgentError::Protocol("unexpected payload".into())));

    let err = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap_err();

    assert!(matches!(err, SupervisorError::Agent { .. }));
    assert_eq!(FakeAgent::count(&h.agent.status_calls), 1);
}

#[tokio::test(start_paused = true)]
async fn long_logs_are_tail_truncated_with_banner() {
    init_tracing();
    let h = started(ConfigBuilder::new().with_tail(2).build()).await;
    h.agent.push_state(OperationState::Succeeded, None);
    h.agent.set_logs(
        (1..=5)
            .map(|i| LogLine::stdout(format!("line {i}")))
            .chain([LogLine::stderr("only error")])
            .collect(),
    );

    let outcome = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap();

    let record = outcome.record();
    assert!(record.truncated.stdout);
    assert!(!record.truncated.stderr);
    assert_eq!(record.logs.stdout.len(), 5);
    assert!(record.logs.stdout[1].contains("stdout: showing last 2 of 5 lines"));
    assert_eq!(&record.logs.stdout[3..], ["line 4", "line 5"]);
    assert_eq!(record.logs.stderr, vec!["only error"]);
}

#[tokio::test(start_paused = true)]
async fn log_capture_can_be_disabled() {
    init_tracing();
    let h = started(ConfigBuilder::new().with_feature("log_capture", false).build()).await;
    h.agent.push_state(OperationState::Succeeded, None);

    let outcome = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap();

    assert!(outcome.is_terminal());
    assert_eq!(FakeAgent::count(&h.agent.logs_calls), 0);
    assert!(outcome.record().logs.stdout.is_empty());
}

#[tokio::test(start_paused = true)]
async fn exponential_poll_policy_backs_off() {
    init_tracing();
    let mut poll = policy(BackoffStrategyKind::Exponential, "100ms", None, Some("10s"));
    poll.max_interval = Some("400ms".to_string());
    let h = started(ConfigBuilder::new().with_poll(poll).build()).await;
    for _ in 0..3 {
        h.agent.push_state(OperationState::InProgress, None);
    }
    h.agent.push_state(OperationState::Succeeded, None);
    let begun = Instant::now();

    h.orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap();

    // 100 + 200 + 400
    assert_eq!(begun.elapsed(), Duration::from_millis(700));
}

#[tokio::test]
async fn unknown_instance_is_not_found() {
    init_tracing();
    let h = Harness::new(ConfigBuilder::new().build());

    let err = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap_err();

    assert!(matches!(err, SupervisorError::OperationNotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn mismatched_operation_id_or_deployment_is_not_found() {
    init_tracing();
    let h = started(ConfigBuilder::new().build()).await;

    let wrong_id = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts().with_operation_id("op-9"))
        .await;
    assert!(matches!(wrong_id, Err(SupervisorError::OperationNotFound { .. })));

    let other_deployment = PollOptions::new(
        "service-fabrik-0022-b4719e7c-e8d3-4f7f-c515-769ad1c3ebfa",
        INSTANCE_ID,
    );
    let wrong_deployment = h
        .orchestrator
        .get_operation_state(OperationKind::Backup, other_deployment)
        .await;
    assert!(matches!(
        wrong_deployment,
        Err(SupervisorError::OperationNotFound { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn explicit_agent_address_skips_resolution() {
    init_tracing();
    let h = Harness::new(ConfigBuilder::new().build());
    let record = h
        .orchestrator
        .start(StartOptionsBuilder::new("op-1").build())
        .await
        .unwrap()
        .record;
    // Forget the cached address.
    let mut stripped = record.clone();
    stripped.agent_address = None;
    h.store.insert(key(), stripped).await;
    h.agent.push_state(OperationState::Succeeded, None);

    let mut opts = poll_opts();
    opts.agent_address = Some("10.11.0.9:2718".to_string());
    h.orchestrator
        .get_operation_state(OperationKind::Backup, opts)
        .await
        .unwrap();

    // Only the resolution done by start.
    assert_eq!(FakeAgent::count(&h.agent.resolve_calls), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_terminal_write_is_declined() {
    init_tracing();
    let h = started(ConfigBuilder::new().build()).await;
    h.agent.push_state(OperationState::Failed, None);
    h.orchestrator
        .get_operation_state(OperationKind::Backup, poll_opts())
        .await
        .unwrap();
    let patches = h.store.patch_count();

    let late = h
        .orchestrator
        .guarded_write(
            &key(),
            "op-1",
            OperationState::Succeeded,
            StatusPatch::new("op-1").state(OperationState::Succeeded),
        )
        .await
        .unwrap();

    assert!(!late.applied());
    assert_eq!(late.into_record().state, OperationState::Failed);
    assert_eq!(h.store.patch_count(), patches);
}

#[test]
fn poll_options_deserialize_from_json() {
    let opts: PollOptions = serde_json::from_value(serde_json::json!({
        "deployment": DEPLOYMENT,
        "instance_id": INSTANCE_ID,
        "operation_id": "op-1",
        "timeout": "30s"
    }))
    .unwrap();

    assert_eq!(opts.timeout, Some(Duration::from_secs(30)));
    assert_eq!(opts.operation_id.as_deref(), Some("op-1"));

    let unknown = serde_json::from_value::<PollOptions>(serde_json::json!({
        "deployment": DEPLOYMENT,
        "instance_id": INSTANCE_ID,
        "polling": true
    }));
    assert!(unknown.is_err());
}
