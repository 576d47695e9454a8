// src/orchestrator/options.rs

//! Per-operation option structs and results.
//!
//! Options deserialize from caller-supplied JSON/TOML and reject unknown
//! fields.

use std::time::Duration;

use serde::Deserialize;

use crate::config::duration::deserialize_opt;
use crate::mask::Params;
use crate::operation::{OperationRecord, OperationState};
use crate::types::OperationKind;

use super::report::{describe_running, describe_terminal};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartOptions {
    /// Caller-supplied id, unique per service instance.
    pub operation_id: String,
    pub kind: OperationKind,
    pub deployment: String,
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: String,
    /// Passed to the agent verbatim; only ever logged masked.
    #[serde(default)]
    pub params: Params,
    /// Register a recurring job after a successful start.
    #[serde(default)]
    pub schedule: Option<ScheduleOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleOptions {
    /// Cron-style expression handed to the scheduler.
    pub repeat_interval: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollOptions {
    pub deployment: String,
    pub instance_id: String,
    /// When set, the stored record must belong to this operation.
    #[serde(default)]
    pub operation_id: Option<String>,
    /// Overrides the address cached in the record.
    #[serde(default)]
    pub agent_address: Option<String>,
    /// Overrides the configured poll timeout.
    #[serde(default, deserialize_with = "deserialize_opt")]
    pub timeout: Option<Duration>,
}

impl PollOptions {
    pub fn new(deployment: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            deployment: deployment.into(),
            instance_id: instance_id.into(),
            operation_id: None,
            agent_address: None,
            timeout: None,
        }
    }

    pub fn with_operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbortOptions {
    pub deployment: String,
    pub instance_id: String,
}

impl AbortOptions {
    pub fn new(deployment: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            deployment: deployment.into(),
            instance_id: instance_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    /// The record as persisted (state `in_progress`).
    pub record: OperationRecord,
    /// Whether a recurring job was registered.
    pub scheduled: bool,
}

/// Result of `get_operation_state`.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The operation reached a terminal state.
    Finished {
        state: OperationState,
        description: String,
        record: OperationRecord,
    },
    /// The poll timed out while the agent still reported work in progress.
    InProgress {
        stage: Option<String>,
        description: String,
        record: OperationRecord,
    },
}

impl PollOutcome {
    /// Build the caller view from a stored record.
    pub fn from_record(record: OperationRecord) -> Self {
        if record.state.is_terminal() {
            let description = record.description.clone().unwrap_or_else(|| {
                describe_terminal(
                    record.kind,
                    &record.deployment,
                    record.state,
                    record.finished_at.unwrap_or(record.started_at),
                )
            });
            PollOutcome::Finished {
                state: record.state,
                description,
                record,
            }
        } else {
            let description = describe_running(
                record.kind,
                &record.deployment,
                record.stage.as_deref(),
            );
            PollOutcome::InProgress {
                stage: record.stage.clone(),
                description,
                record,
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PollOutcome::Finished { .. })
    }

    pub fn state(&self) -> OperationState {
        self.record().state
    }

    pub fn description(&self) -> &str {
        match self {
            PollOutcome::Finished { description, .. } | PollOutcome::InProgress { description, .. } => {
                description
            }
        }
    }

    pub fn record(&self) -> &OperationRecord {
        match self {
            PollOutcome::Finished { record, .. } | PollOutcome::InProgress { record, .. } => record,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbortOutcome {
    /// State stored after the abort attempt (may be a terminal state that won the race).
    pub state: OperationState,
    pub record: OperationRecord,
    /// Whether the abort primitive was sent to the agent.
    pub requested: bool,
}
