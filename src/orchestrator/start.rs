// src/orchestrator/start.rs

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::agent::AgentAddress;
use crate::config::Feature;
use crate::deployment::DeploymentName;
use crate::errors::{Result, SupervisorError};
use crate::mask::{mask_sensitive, Params};
use crate::operation::{Operation, OperationState};
use crate::retry::{retry, Signal};
use crate::scheduler::JobSpec;
use crate::store::{ResourceKey, StatusPatch, StoreError};
use crate::types::OperationKind;
use crate::version::Version;

use super::options::{ScheduleOptions, StartOptions, StartOutcome};
use super::{budget_failure, classify, Orchestrator};

impl Orchestrator {
    /// Start a new operation on its agent and persist it as `in_progress`.
    ///
    /// Everything that can be checked locally (deployment name, plan, feature
    /// flags, conflicting operations) is checked before the agent is touched.
    /// If the agent cannot be reached within the start retry budget nothing
    /// is persisted.
    pub async fn start(&self, opts: StartOptions) -> Result<StartOutcome> {
        let deployment = self.config.deployment.parse(&opts.deployment)?;

        let plan = self.catalog.get_plan(&opts.plan_id)?;
        if !plan.supports(opts.kind) {
            return Err(SupervisorError::Validation(format!(
                "plan '{}' does not support {}",
                plan.name, opts.kind
            )));
        }

        if let Some(schedule) = &opts.schedule {
            self.check_schedule_request(opts.kind, schedule)?;
        }

        let key = ResourceKey::new(opts.kind, &opts.instance_id);
        self.ensure_no_conflict(&key, &opts.operation_id).await?;

        info!(
            operation_id = %opts.operation_id,
            deployment = %deployment,
            kind = %opts.kind,
            params = ?mask_sensitive(&opts.params),
            "starting operation"
        );

        let mut operation = Operation::new(
            &opts.operation_id,
            opts.kind,
            deployment.clone(),
            &opts.instance_id,
            &opts.service_id,
            &opts.plan_id,
            Utc::now(),
        );

        let address = self
            .start_on_agent(&deployment, opts.kind, &opts.params)
            .await?;
        operation.agent_address = Some(address);
        operation.transition(OperationState::InProgress, Utc::now());

        let record = {
            let _guard = self.locks.lock(&key).await;
            self.store
                .patch(&key, StatusPatch::from_record(&operation.to_record()))
                .await?
        };

        info!(
            operation_id = %record.id,
            deployment = %record.deployment,
            agent = ?record.agent_address,
            "operation in progress"
        );

        let scheduled = match opts.schedule {
            Some(schedule) => {
                self.register_schedule(&operation, &opts.params, schedule)
                    .await
            }
            None => false,
        };

        Ok(StartOutcome { record, scheduled })
    }

    fn check_schedule_request(&self, kind: OperationKind, schedule: &ScheduleOptions) -> Result<()> {
        if !self.config.features.is_enabled(Feature::ScheduledBackup) {
            return Err(SupervisorError::Validation(format!(
                "scheduling requested but feature '{}' is disabled",
                Feature::ScheduledBackup
            )));
        }
        if kind != OperationKind::Backup {
            return Err(SupervisorError::Validation(format!(
                "only backups can be scheduled (got {kind})"
            )));
        }
        if schedule.repeat_interval.trim().is_empty() {
            return Err(SupervisorError::Validation(
                "schedule.repeat_interval must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Reject reusing an id or starting while another operation is running.
    async fn ensure_no_conflict(&self, key: &ResourceKey, operation_id: &str) -> Result<()> {
        let existing = match self.store.get(key).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if existing.id == operation_id {
            return Err(SupervisorError::Validation(format!(
                "operation id '{operation_id}' already used for {key}"
            )));
        }
        if !existing.state.is_terminal() {
            return Err(SupervisorError::Validation(format!(
                "operation '{}' for {key} is still {}",
                existing.id, existing.state
            )));
        }
        Ok(())
    }

    /// Resolve the agent and issue the start call within the start retry budget.
    async fn start_on_agent(
        &self,
        deployment: &DeploymentName,
        kind: OperationKind,
        params: &Params,
    ) -> Result<AgentAddress> {
        let name = deployment.as_str();

        let attempt = || async move {
            let address = match self.agent.resolve_address(deployment).await {
                Ok(address) => address,
                Err(e) => return classify(name, e),
            };

            if let Some(min) = self.config.min_agent_version {
                match self.agent.version(&address).await {
                    Ok(raw) => {
                        if let Err(e) = ensure_min_version(&raw, min) {
                            return Signal::Fail(e);
                        }
                    }
                    Err(e) => return classify(name, e),
                }
            }

            match self.agent.start(&address, kind, params).await {
                Ok(()) => Signal::Succeed(address),
                Err(e) => classify(name, e),
            }
        };

        retry(&self.config.start_retry, attempt)
            .await
            .map_err(|e| budget_failure(name, "agent start", e))
    }

    /// Fire-and-forget registration of the next run.
    async fn register_schedule(
        &self,
        operation: &Operation,
        params: &Params,
        schedule: ScheduleOptions,
    ) -> bool {
        let job = JobSpec {
            name: format!("{}_{}", operation.kind, operation.instance_id),
            kind: operation.kind,
            instance_id: operation.instance_id.clone(),
            deployment: operation.deployment.to_string(),
            repeat_interval: schedule.repeat_interval,
            params: mask_sensitive(params),
        };
        let job_name = job.name.clone();

        match self.scheduler.schedule(job).await {
            Ok(()) => {
                debug!(job = %job_name, "registered recurring job");
                true
            }
            Err(e) => {
                warn!(
                    job = %job_name,
                    operation_id = %operation.id,
                    error = %e,
                    "failed to register recurring job; operation continues"
                );
                false
            }
        }
    }
}

fn ensure_min_version(raw: &str, min: Version) -> Result<()> {
    let reported: Version = raw.parse()?;
    if reported < min {
        return Err(SupervisorError::Validation(format!(
            "agent version {reported} is older than required {min}"
        )));
    }
    Ok(())
}
