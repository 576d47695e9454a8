// src/operation/state.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an operation.
///
/// Allowed paths: `triggering -> in_progress -> {succeeded | failed}` and
/// `in_progress -> aborting -> aborted`. A job that finished naturally
/// outranks an abort, so `aborting -> {succeeded | failed}` is also allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Triggering,
    InProgress,
    Succeeded,
    Failed,
    Aborting,
    Aborted,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Succeeded | OperationState::Failed | OperationState::Aborted
        )
    }

    /// Precedence used by the monotonic write guard.
    pub fn rank(&self) -> u8 {
        match self {
            OperationState::Triggering => 0,
            OperationState::InProgress => 1,
            OperationState::Aborting => 2,
            OperationState::Aborted => 3,
            OperationState::Succeeded | OperationState::Failed => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Triggering => "triggering",
            OperationState::InProgress => "in_progress",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
            OperationState::Aborting => "aborting",
            OperationState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "triggering" => Ok(OperationState::Triggering),
            "in_progress" | "processing" => Ok(OperationState::InProgress),
            "succeeded" => Ok(OperationState::Succeeded),
            "failed" => Ok(OperationState::Failed),
            "aborting" => Ok(OperationState::Aborting),
            "aborted" => Ok(OperationState::Aborted),
            other => Err(format!("invalid operation state: {other}")),
        }
    }
}

/// Monotonic transition guard.
///
/// Nothing leaves a terminal state. A non-terminal state may be rewritten
/// with itself (stage refresh); otherwise the target must outrank the
/// current state.
pub fn can_transition(from: OperationState, to: OperationState) -> bool {
    if from.is_terminal() {
        return false;
    }
    from == to || to.rank() > from.rank()
}
