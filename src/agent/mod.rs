// src/agent/mod.rs

//! Agent collaborator boundary.
//!
//! The agent runs next to a deployed service instance and executes
//! backup/restore primitives. The orchestrator only talks to it through the
//! [`Agent`] trait; the concrete transport (domain socket, HTTP) lives
//! outside this crate. Tests provide their own implementation.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::deployment::DeploymentName;
use crate::mask::Params;
use crate::operation::OperationState;
use crate::stream::Channel;
use crate::types::OperationKind;

/// Where an agent can be reached. Resolved once per operation and cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentAddress(String);

impl AgentAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of the agent's last operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOperationStatus {
    pub state: OperationState,
    pub stage: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One captured output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub channel: Channel,
    pub line: String,
}

impl LogLine {
    pub fn stdout(line: impl Into<String>) -> Self {
        Self {
            channel: Channel::Stdout,
            line: line.into(),
        }
    }

    pub fn stderr(line: impl Into<String>) -> Self {
        Self {
            channel: Channel::Stderr,
            line: line.into(),
        }
    }
}

/// Acknowledgement of an abort request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AbortAck {
    /// The agent stopped the job before replying.
    pub completed: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// Transport failure or the agent is busy; worth retrying.
    #[error("agent unreachable: {0}")]
    Unreachable(String),

    /// The agent refused the request.
    #[error("agent rejected request: {0}")]
    Rejected(String),

    /// The agent answered with something we could not interpret.
    #[error("agent protocol error: {0}")]
    Protocol(String),
}

impl AgentError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AgentError::Unreachable(_))
    }
}

/// Operations the orchestrator consumes from an agent.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Find the agent serving `deployment`.
    async fn resolve_address(&self, deployment: &DeploymentName)
        -> Result<AgentAddress, AgentError>;

    /// Version string reported by the agent, e.g. `"1.2.0"`.
    async fn version(&self, address: &AgentAddress) -> Result<String, AgentError>;

    async fn start(
        &self,
        address: &AgentAddress,
        kind: OperationKind,
        params: &Params,
    ) -> Result<(), AgentError>;

    async fn last_operation(
        &self,
        address: &AgentAddress,
        kind: OperationKind,
    ) -> Result<AgentOperationStatus, AgentError>;

    /// Ordered output of the last operation.
    async fn logs(&self, address: &AgentAddress, kind: OperationKind)
        -> Result<Vec<LogLine>, AgentError>;

    async fn abort(&self, address: &AgentAddress, kind: OperationKind)
        -> Result<AbortAck, AgentError>;
}
