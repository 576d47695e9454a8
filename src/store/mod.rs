// src/store/mod.rs

//! Resource store collaborator boundary.
//!
//! The store is the cross-process source of truth for operation status. It
//! only offers single-key get and last-write-wins patch; the orchestrator
//! enforces state precedence itself.
//!
//! [`memory::InMemoryStore`] is an in-process implementation used by tests
//! and local tooling.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::operation::{CapturedLogs, LogStreams, OperationRecord, OperationState, Truncation};
use crate::types::OperationKind;

pub use memory::InMemoryStore;

/// Key of the record holding the *last* operation of `kind` for an instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub kind: OperationKind,
    pub instance_id: String,
}

impl ResourceKey {
    pub fn new(kind: OperationKind, instance_id: impl Into<String>) -> Self {
        Self {
            kind,
            instance_id: instance_id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.instance_id)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("invalid patch for {key}: {reason}")]
    InvalidPatch { key: String, reason: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Partial status update. `None` fields are left untouched.
///
/// A patch whose `id` differs from the stored record's id starts a fresh
/// record and must then carry every required field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPatch {
    pub id: String,
    pub kind: Option<OperationKind>,
    pub deployment: Option<String>,
    pub instance_id: Option<String>,
    pub state: Option<OperationState>,
    pub stage: Option<String>,
    pub description: Option<String>,
    pub agent_address: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub logs: Option<LogStreams>,
    pub truncated: Option<Truncation>,
}

impl StatusPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            deployment: None,
            instance_id: None,
            state: None,
            stage: None,
            description: None,
            agent_address: None,
            started_at: None,
            finished_at: None,
            logs: None,
            truncated: None,
        }
    }

    /// A patch that fully describes `record`.
    pub fn from_record(record: &OperationRecord) -> Self {
        Self {
            id: record.id.clone(),
            kind: Some(record.kind),
            deployment: Some(record.deployment.clone()),
            instance_id: Some(record.instance_id.clone()),
            state: Some(record.state),
            stage: record.stage.clone(),
            description: record.description.clone(),
            agent_address: record.agent_address.clone(),
            started_at: Some(record.started_at),
            finished_at: record.finished_at,
            logs: Some(record.logs.clone()),
            truncated: Some(record.truncated),
        }
    }

    pub fn state(mut self, state: OperationState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn stage(mut self, stage: Option<String>) -> Self {
        self.stage = stage;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn finished_at(mut self, at: DateTime<Utc>) -> Self {
        self.finished_at = Some(at);
        self
    }

    pub fn captured_logs(mut self, captured: CapturedLogs) -> Self {
        self.logs = Some(captured.logs);
        self.truncated = Some(captured.truncated);
        self
    }

    /// Merge into an existing record with the same id.
    pub fn apply_to(self, record: &mut OperationRecord) {
        if let Some(state) = self.state {
            record.state = state;
        }
        if self.stage.is_some() {
            record.stage = self.stage;
        }
        if self.description.is_some() {
            record.description = self.description;
        }
        if self.agent_address.is_some() {
            record.agent_address = self.agent_address;
        }
        if let Some(started_at) = self.started_at {
            record.started_at = started_at;
        }
        if self.finished_at.is_some() {
            record.finished_at = self.finished_at;
        }
        if let Some(logs) = self.logs {
            record.logs = logs;
        }
        if let Some(truncated) = self.truncated {
            record.truncated = truncated;
        }
    }

    /// Build a fresh record; fails when a required field is missing.
    pub fn into_record(self, key: &ResourceKey) -> Result<OperationRecord, StoreError> {
        let missing = |field: &str| StoreError::InvalidPatch {
            key: key.to_string(),
            reason: format!("new record for operation '{}' is missing `{field}`", self.id),
        };

        let kind = self.kind.ok_or_else(|| missing("kind"))?;
        let deployment = self.deployment.clone().ok_or_else(|| missing("deployment"))?;
        let instance_id = self.instance_id.clone().ok_or_else(|| missing("instanceId"))?;
        let state = self.state.ok_or_else(|| missing("state"))?;
        let started_at = self.started_at.ok_or_else(|| missing("startedAt"))?;

        Ok(OperationRecord {
            id: self.id,
            kind,
            deployment,
            instance_id,
            state,
            stage: self.stage,
            description: self.description,
            agent_address: self.agent_address,
            started_at,
            finished_at: self.finished_at,
            logs: self.logs.unwrap_or_default(),
            truncated: self.truncated.unwrap_or_default(),
        })
    }
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fails with [`StoreError::NotFound`] when no record exists.
    async fn get(&self, key: &ResourceKey) -> Result<OperationRecord, StoreError>;

    /// Apply `patch` (last write wins) and return the stored record.
    async fn patch(&self, key: &ResourceKey, patch: StatusPatch)
        -> Result<OperationRecord, StoreError>;
}
