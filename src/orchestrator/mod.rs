// src/orchestrator/mod.rs

//! Backup-operation orchestrator.
//!
//! Drives one operation through its lifecycle against the external
//! collaborators:
//! - [`start`](Orchestrator::start): start the job on the agent and persist
//!   the first `in_progress` record.
//! - [`get_operation_state`](Orchestrator::get_operation_state): poll the
//!   agent until a terminal state or timeout, then capture logs and persist
//!   the terminal record once.
//! - [`abort_last_backup`](Orchestrator::abort_last_backup): race-aware abort.
//!
//! Every status write after `start` goes through [`Orchestrator::guarded_write`],
//! which re-reads the stored record and refuses to move it backwards.

mod abort;
pub mod locks;
pub mod options;
mod poll;
pub mod report;
mod start;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentAddress, AgentError};
use crate::catalog::Catalog;
use crate::config::ConfigFile;
use crate::errors::{Result, SupervisorError};
use crate::operation::{can_transition, OperationRecord, OperationState};
use crate::retry::{RetryError, Signal};
use crate::scheduler::Scheduler;
use crate::store::{ResourceKey, ResourceStore, StatusPatch, StoreError};

pub use locks::KeyedLocks;
pub use options::{
    AbortOptions, AbortOutcome, PollOptions, PollOutcome, ScheduleOptions, StartOptions,
    StartOutcome,
};

/// Result of a guarded store write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The patch was stored; carries the new record.
    Applied(OperationRecord),
    /// The stored record already held an equal-or-higher precedence state or
    /// belongs to another operation; carries the untouched record.
    Declined(OperationRecord),
}

impl WriteOutcome {
    pub fn into_record(self) -> OperationRecord {
        match self {
            WriteOutcome::Applied(r) | WriteOutcome::Declined(r) => r,
        }
    }

    pub fn applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied(_))
    }
}

/// Owns the collaborators; cheap to clone (all shared handles).
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<ConfigFile>,
    agent: Arc<dyn Agent>,
    store: Arc<dyn ResourceStore>,
    scheduler: Arc<dyn Scheduler>,
    catalog: Arc<dyn Catalog>,
    locks: KeyedLocks,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        config: ConfigFile,
        agent: Arc<dyn Agent>,
        store: Arc<dyn ResourceStore>,
        scheduler: Arc<dyn Scheduler>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            agent,
            store,
            scheduler,
            catalog,
            locks: KeyedLocks::new(),
        }
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Read the record for `key`, checking it belongs to `deployment`.
    async fn load_record(
        &self,
        key: &ResourceKey,
        deployment: &str,
        instance_id: &str,
    ) -> Result<OperationRecord> {
        let not_found = || SupervisorError::OperationNotFound {
            deployment: deployment.to_string(),
            instance_id: instance_id.to_string(),
        };

        let record = match self.store.get(key).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };

        if record.deployment != deployment {
            return Err(not_found());
        }
        Ok(record)
    }

    /// Agent address for an existing record: explicit override, then the
    /// address cached at start, then a fresh resolution.
    async fn address_for(
        &self,
        record: &OperationRecord,
        explicit: Option<&str>,
    ) -> Result<AgentAddress> {
        if let Some(address) = explicit.or(record.agent_address.as_deref()) {
            return Ok(AgentAddress::new(address));
        }

        let deployment = self.config.deployment.parse(&record.deployment)?;
        self.agent
            .resolve_address(&deployment)
            .await
            .map_err(|e| agent_failure(&record.deployment, e))
    }

    /// Re-read the stored record and apply `patch` only if moving from the
    /// stored state to `target` is monotonic and the record still belongs to
    /// operation `id`.
    pub async fn guarded_write(
        &self,
        key: &ResourceKey,
        id: &str,
        target: OperationState,
        patch: StatusPatch,
    ) -> Result<WriteOutcome> {
        let _guard = self.locks.lock(key).await;

        let current = self.store.get(key).await?;

        if current.id != id {
            info!(
                key = %key,
                operation_id = %id,
                stored_operation_id = %current.id,
                "record belongs to another operation; skipping write"
            );
            return Ok(WriteOutcome::Declined(current));
        }

        if !can_transition(current.state, target) {
            info!(
                key = %key,
                operation_id = %id,
                stored = %current.state,
                attempted = %target,
                "declining non-monotonic state write"
            );
            return Ok(WriteOutcome::Declined(current));
        }

        let stored = self.store.patch(key, patch).await?;
        Ok(WriteOutcome::Applied(stored))
    }
}

/// Map an agent error onto the crate error, keeping the deployment for context.
fn agent_failure(deployment: &str, source: AgentError) -> SupervisorError {
    if source.is_transient() {
        SupervisorError::AgentUnreachable {
            deployment: deployment.to_string(),
            source,
        }
    } else {
        SupervisorError::Agent {
            deployment: deployment.to_string(),
            source,
        }
    }
}

/// Transient agent errors are retried; everything else fails the attempt.
fn classify<T>(deployment: &str, e: AgentError) -> Signal<T, SupervisorError> {
    if e.is_transient() {
        debug!(deployment = %deployment, error = %e, "transient agent error");
        Signal::Retry(Some(agent_failure(deployment, e)))
    } else {
        Signal::Fail(agent_failure(deployment, e))
    }
}

/// Collapse a failed agent retry loop into the error the caller sees.
fn budget_failure(
    deployment: &str,
    action: &str,
    err: RetryError<SupervisorError>,
) -> SupervisorError {
    match err {
        RetryError::Failed(e) => e,
        RetryError::Exhausted {
            attempts,
            elapsed,
            last_error,
        } => {
            warn!(
                deployment = %deployment,
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                "{action} retry budget exhausted"
            );
            last_error.unwrap_or(SupervisorError::RetryExhausted {
                attempts,
                elapsed,
                last_error: None,
            })
        }
    }
}
