// src/operation/mod.rs

//! Backup/restore operation model.
//!
//! - [`state`] holds the state enum, its precedence ranks and the pure
//!   transition guard shared by every write path.
//! - [`record`] is the persisted/externalised shape kept in the resource store.
//! - [`Operation`] is the orchestrator's in-memory working copy while a start
//!   is in flight.

pub mod record;
pub mod state;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::agent::AgentAddress;
use crate::deployment::DeploymentName;
use crate::types::OperationKind;

pub use record::{CapturedLogs, LogStreams, OperationRecord, Truncation};
pub use state::{can_transition, OperationState};

/// One backup or restore job.
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: String,
    pub kind: OperationKind,
    pub deployment: DeploymentName,
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: String,
    pub agent_address: Option<AgentAddress>,
    state: OperationState,
    pub stage: Option<String>,
    pub started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Operation {
    /// New operation in state `triggering`.
    pub fn new(
        id: impl Into<String>,
        kind: OperationKind,
        deployment: DeploymentName,
        instance_id: impl Into<String>,
        service_id: impl Into<String>,
        plan_id: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            deployment,
            instance_id: instance_id.into(),
            service_id: service_id.into(),
            plan_id: plan_id.into(),
            agent_address: None,
            state: OperationState::Triggering,
            stage: None,
            started_at,
            finished_at: None,
        }
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Move to `next` if the guard allows it; returns whether it applied.
    ///
    /// `finished_at` is stamped with `at` on the first terminal transition
    /// and never changes afterwards.
    pub fn transition(&mut self, next: OperationState, at: DateTime<Utc>) -> bool {
        if !can_transition(self.state, next) {
            debug!(
                operation_id = %self.id,
                from = %self.state,
                to = %next,
                "ignoring non-monotonic transition"
            );
            return false;
        }
        self.state = next;
        if next.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(at);
        }
        true
    }

    pub fn to_record(&self) -> OperationRecord {
        OperationRecord {
            id: self.id.clone(),
            kind: self.kind,
            deployment: self.deployment.to_string(),
            instance_id: self.instance_id.clone(),
            state: self.state,
            stage: self.stage.clone(),
            description: None,
            agent_address: self.agent_address.as_ref().map(|a| a.to_string()),
            started_at: self.started_at,
            finished_at: self.finished_at,
            logs: LogStreams::default(),
            truncated: Truncation::default(),
        }
    }
}
