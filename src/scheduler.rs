// src/scheduler.rs

//! Recurring-job scheduler collaborator.
//!
//! The orchestrator only registers the next run; deciding *when* a job fires
//! is the scheduler's business.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::errors::Result;
use crate::mask::Params;
use crate::types::OperationKind;

/// Recurring job registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    /// Stable job name, `"<kind>_<instance_id>"`.
    pub name: String,
    pub kind: OperationKind,
    pub instance_id: String,
    pub deployment: String,
    /// Cron-style repeat expression, passed through verbatim.
    pub repeat_interval: String,
    /// Already masked.
    pub params: Params,
}

#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn schedule(&self, job: JobSpec) -> Result<()>;
}

/// Scheduler that accepts and drops every job.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScheduler;

#[async_trait]
impl Scheduler for NoopScheduler {
    async fn schedule(&self, job: JobSpec) -> Result<()> {
        debug!(job = %job.name, "no-op scheduler dropping job");
        Ok(())
    }
}
