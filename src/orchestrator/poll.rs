// src/orchestrator/poll.rs

use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info};

use crate::agent::{AgentAddress, AgentOperationStatus, LogLine};
use crate::config::Feature;
use crate::errors::{Result, SupervisorError};
use crate::operation::{can_transition, OperationRecord};
use crate::retry::{retry, RetryError, Signal};
use crate::store::{ResourceKey, StatusPatch};
use crate::types::OperationKind;

use super::options::{PollOptions, PollOutcome};
use super::report::{capture_logs, describe_running, describe_terminal};
use super::{agent_failure, budget_failure, classify, Orchestrator};

impl Orchestrator {
    /// Poll the agent until the operation is terminal or the timeout elapses.
    ///
    /// A timeout while the agent still reports work is not an error: the
    /// result is [`PollOutcome::InProgress`] and the operation stays
    /// `in_progress` for later polls. An already-terminal stored record is
    /// returned without contacting the agent.
    pub async fn get_operation_state(
        &self,
        kind: OperationKind,
        opts: PollOptions,
    ) -> Result<PollOutcome> {
        let key = ResourceKey::new(kind, &opts.instance_id);
        let record = self
            .load_record(&key, &opts.deployment, &opts.instance_id)
            .await?;

        if let Some(id) = &opts.operation_id {
            if id != &record.id {
                return Err(SupervisorError::OperationNotFound {
                    deployment: opts.deployment.clone(),
                    instance_id: opts.instance_id.clone(),
                });
            }
        }

        if record.state.is_terminal() {
            debug!(operation_id = %record.id, state = %record.state, "stored record already terminal");
            return Ok(PollOutcome::from_record(record));
        }

        let address = self
            .address_for(&record, opts.agent_address.as_deref())
            .await?;

        let mut policy = self.config.poll.clone();
        if let Some(timeout) = opts.timeout {
            policy = policy.with_max_duration(timeout);
        }

        // Latest running status seen by any attempt, so a transient error on
        // the final attempt still reports the job as in progress.
        let latest_running: Mutex<Option<AgentOperationStatus>> = Mutex::new(None);
        let seen = &latest_running;
        let address_ref = &address;
        let polled = retry(&policy, || async move {
            match self.agent.last_operation(address_ref, kind).await {
                Ok(status) if status.state.is_terminal() => Signal::Succeed(status),
                Ok(status) => {
                    debug!(state = %status.state, stage = ?status.stage, "agent still working");
                    *seen.lock().unwrap_or_else(PoisonError::into_inner) = Some(status);
                    Signal::Retry(None)
                }
                Err(e) if e.is_transient() => Signal::Retry(Some(e)),
                Err(e) => Signal::Fail(e),
            }
        })
        .await;
        let latest_running = latest_running
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        match polled {
            Ok(status) => self.finish(&key, record, &address, status).await,
            Err(RetryError::Exhausted {
                attempts,
                elapsed,
                last_error,
            }) => match latest_running {
                Some(status) => self.still_running(&key, record, status).await,
                None => Err(SupervisorError::RetryExhausted {
                    attempts,
                    elapsed,
                    last_error: last_error.map(|e| {
                        format!("operation '{}' on {}: {e}", record.id, record.deployment)
                    }),
                }),
            },
            Err(RetryError::Failed(e)) => Err(agent_failure(&record.deployment, e)),
        }
    }

    /// Capture logs and persist the terminal record exactly once.
    async fn finish(
        &self,
        key: &ResourceKey,
        record: OperationRecord,
        address: &AgentAddress,
        status: AgentOperationStatus,
    ) -> Result<PollOutcome> {
        let finished_at = status.updated_at.unwrap_or_else(Utc::now);
        let description =
            describe_terminal(record.kind, &record.deployment, status.state, finished_at);

        let mut patch = StatusPatch::new(&record.id)
            .state(status.state)
            .stage(status.stage.clone())
            .description(&description)
            .finished_at(finished_at);

        if self.config.features.is_enabled(Feature::LogCapture) {
            let lines = self.fetch_logs(&record, address).await?;
            let captured = capture_logs(lines, self.config.log_tail);
            debug!(
                operation_id = %record.id,
                stdout_truncated = captured.truncated.stdout,
                stderr_truncated = captured.truncated.stderr,
                "captured agent logs"
            );
            patch = patch.captured_logs(captured);
        }

        let written = self
            .guarded_write(key, &record.id, status.state, patch)
            .await?;
        if written.applied() {
            info!(operation_id = %record.id, state = %status.state, "{description}");
        }

        Ok(PollOutcome::from_record(written.into_record()))
    }

    /// Persist the latest stage after a poll timeout.
    async fn still_running(
        &self,
        key: &ResourceKey,
        record: OperationRecord,
        status: AgentOperationStatus,
    ) -> Result<PollOutcome> {
        let target = if can_transition(record.state, status.state) {
            status.state
        } else {
            record.state
        };

        let unchanged = target == record.state
            && (status.stage.is_none() || status.stage == record.stage);
        let stored = if unchanged {
            record
        } else {
            let patch = StatusPatch::new(&record.id)
                .state(target)
                .stage(status.stage.clone());
            self.guarded_write(key, &record.id, target, patch)
                .await?
                .into_record()
        };

        if stored.state.is_terminal() {
            // Another writer finished the operation while we were polling.
            return Ok(PollOutcome::from_record(stored));
        }

        let stage = status.stage.or(stored.stage.clone());
        let description = describe_running(stored.kind, &stored.deployment, stage.as_deref());
        debug!(operation_id = %stored.id, "{description}");

        Ok(PollOutcome::InProgress {
            stage,
            description,
            record: stored,
        })
    }

    /// Fetch the agent's log lines within the start retry budget.
    async fn fetch_logs(
        &self,
        record: &OperationRecord,
        address: &AgentAddress,
    ) -> Result<Vec<LogLine>> {
        let deployment = record.deployment.as_str();
        let kind = record.kind;

        retry(&self.config.start_retry, || async move {
            match self.agent.logs(address, kind).await {
                Ok(lines) => Signal::Succeed(lines),
                Err(e) => classify(deployment, e),
            }
        })
        .await
        .map_err(|e| budget_failure(deployment, "log fetch", e))
    }
}
