// src/orchestrator/abort.rs

use chrono::Utc;
use tracing::info;

use crate::errors::Result;
use crate::operation::OperationState;
use crate::store::{ResourceKey, StatusPatch};
use crate::types::OperationKind;

use super::options::{AbortOptions, AbortOutcome};
use super::report::describe_terminal;
use super::{agent_failure, Orchestrator};

impl Orchestrator {
    /// Abort the last backup of an instance.
    ///
    /// The abort is advisory for the agent. The stored state moves to
    /// `aborting`, or straight to `aborted` when `immediate` is requested and
    /// the agent confirms it stopped the job. If the job finished in the
    /// meantime the finished state wins and is returned unchanged.
    pub async fn abort_last_backup(
        &self,
        opts: AbortOptions,
        immediate: bool,
    ) -> Result<AbortOutcome> {
        let kind = OperationKind::Backup;
        let key = ResourceKey::new(kind, &opts.instance_id);
        let record = self
            .load_record(&key, &opts.deployment, &opts.instance_id)
            .await?;

        if record.state.is_terminal() {
            info!(
                operation_id = %record.id,
                state = %record.state,
                "operation already finished; nothing to abort"
            );
            return Ok(AbortOutcome {
                state: record.state,
                record,
                requested: false,
            });
        }

        if record.state == OperationState::Aborting && !immediate {
            info!(operation_id = %record.id, "abort already in progress");
            return Ok(AbortOutcome {
                state: record.state,
                record,
                requested: false,
            });
        }

        let address = self.address_for(&record, None).await?;
        let ack = self
            .agent
            .abort(&address, kind)
            .await
            .map_err(|e| agent_failure(&record.deployment, e))?;

        let target = if immediate && ack.completed {
            OperationState::Aborted
        } else {
            OperationState::Aborting
        };

        let mut patch = StatusPatch::new(&record.id).state(target);
        if target.is_terminal() {
            let now = Utc::now();
            patch = patch
                .finished_at(now)
                .description(describe_terminal(kind, &record.deployment, target, now));
        }

        let written = self.guarded_write(&key, &record.id, target, patch).await?;
        let applied = written.applied();
        let stored = written.into_record();

        info!(
            operation_id = %stored.id,
            requested = %target,
            stored = %stored.state,
            applied,
            "abort processed"
        );

        Ok(AbortOutcome {
            state: stored.state,
            record: stored,
            requested: true,
        })
    }
}
