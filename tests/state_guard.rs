mod common;
use crate::common::{init_tracing, DEPLOYMENT, INSTANCE_ID};

use chrono::{TimeZone, Utc};

use backup_supervisor::deployment::DeploymentGrammar;
use backup_supervisor::operation::{can_transition, Operation, OperationState};
use backup_supervisor::store::{InMemoryStore, ResourceKey, ResourceStore, StatusPatch, StoreError};
use backup_supervisor::types::OperationKind;

use OperationState::*;

const ALL: [OperationState; 6] = [Triggering, InProgress, Succeeded, Failed, Aborting, Aborted];

#[test]
fn nothing_leaves_a_terminal_state() {
    for from in [Succeeded, Failed, Aborted] {
        for to in ALL {
            assert!(!can_transition(from, to), "{from} -> {to} must be refused");
        }
    }
}

#[test]
fn forward_paths_are_allowed() {
    for (from, to) in [
        (Triggering, InProgress),
        (InProgress, Succeeded),
        (InProgress, Failed),
        (InProgress, Aborting),
        (Aborting, Aborted),
        (Aborting, Succeeded),
        (Aborting, Failed),
        (InProgress, InProgress),
        (Aborting, Aborting),
    ] {
        assert!(can_transition(from, to), "{from} -> {to} must be allowed");
    }
}

#[test]
fn backward_paths_are_refused() {
    for (from, to) in [
        (InProgress, Triggering),
        (Aborting, InProgress),
        (Aborting, Triggering),
    ] {
        assert!(!can_transition(from, to), "{from} -> {to} must be refused");
    }
}

#[test]
fn state_names_parse_and_serialize() {
    for state in ALL {
        assert_eq!(state.as_str().parse::<OperationState>().unwrap(), state);
        assert_eq!(
            serde_json::to_value(state).unwrap(),
            serde_json::Value::String(state.as_str().to_string())
        );
    }
    assert_eq!("processing".parse::<OperationState>().unwrap(), InProgress);
    assert!("paused".parse::<OperationState>().is_err());
}

#[test]
fn operation_stamps_finished_at_once() {
    let grammar = DeploymentGrammar::new("service-fabrik", 4).unwrap();
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
    let mut op = Operation::new(
        "op-1",
        OperationKind::Backup,
        grammar.parse(DEPLOYMENT).unwrap(),
        INSTANCE_ID,
        "service",
        "plan",
        t0,
    );

    assert_eq!(op.state(), Triggering);
    assert!(op.transition(InProgress, t0));
    assert!(op.transition(Failed, t1));
    assert!(!op.transition(Succeeded, t1 + chrono::Duration::minutes(5)));
    assert_eq!(op.state(), Failed);
    assert_eq!(op.finished_at(), Some(t1));

    let record = op.to_record();
    assert_eq!(record.state, Failed);
    assert_eq!(record.deployment, DEPLOYMENT);
}

#[tokio::test]
async fn store_merges_patches_for_same_id_and_replaces_on_new_id() {
    init_tracing();
    let store = InMemoryStore::new();
    let key = ResourceKey::new(OperationKind::Backup, INSTANCE_ID);
    let started = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    let mut first = StatusPatch::new("op-1").state(InProgress);
    first.kind = Some(OperationKind::Backup);
    first.deployment = Some(DEPLOYMENT.to_string());
    first.instance_id = Some(INSTANCE_ID.to_string());
    first.started_at = Some(started);
    store.patch(&key, first.clone()).await.unwrap();

    let merged = store
        .patch(&key, StatusPatch::new("op-1").stage(Some("upload".into())))
        .await
        .unwrap();
    assert_eq!(merged.state, InProgress);
    assert_eq!(merged.stage.as_deref(), Some("upload"));

    let mut second = first;
    second.id = "op-2".to_string();
    let replaced = store.patch(&key, second).await.unwrap();
    assert_eq!(replaced.id, "op-2");
    assert_eq!(replaced.stage, None);
    assert_eq!(store.patch_count(), 3);

    assert_eq!(key.to_string(), format!("backup/{INSTANCE_ID}"));
}

#[tokio::test]
async fn incomplete_patch_cannot_create_a_record() {
    init_tracing();
    let store = InMemoryStore::new();
    let key = ResourceKey::new(OperationKind::Restore, INSTANCE_ID);

    let err = store
        .patch(&key, StatusPatch::new("op-1").state(InProgress))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::InvalidPatch { .. }));
    assert_eq!(store.patch_count(), 0);
    assert!(matches!(store.get(&key).await, Err(StoreError::NotFound(_))));
}
