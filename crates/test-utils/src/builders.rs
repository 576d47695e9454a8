#![allow(dead_code)]

use std::sync::Arc;

use backup_supervisor::catalog::{Plan, StaticCatalog};
use backup_supervisor::config::{ConfigFile, PolicySection, RawConfigFile};
use backup_supervisor::mask::Params;
use backup_supervisor::orchestrator::{Orchestrator, ScheduleOptions, StartOptions};
use backup_supervisor::store::InMemoryStore;
use backup_supervisor::types::{BackoffStrategyKind, OperationKind};

use crate::fake_agent::FakeAgent;
use crate::recording_scheduler::RecordingScheduler;

pub const DEPLOYMENT: &str = "service-fabrik-0021-b4719e7c-e8d3-4f7f-c515-769ad1c3ebfa";
pub const INSTANCE_ID: &str = "b4719e7c-e8d3-4f7f-c515-769ad1c3ebfa";
pub const SERVICE_ID: &str = "24731fb8-7b84-4f57-914f-c3d55d793dd4";
pub const PLAN_ID: &str = "bc158c9a-7934-401e-94ab-057082a5073f";
pub const NO_BACKUP_PLAN_ID: &str = "d616b00a-5949-4b1c-bc73-0d3c59f3954a";

/// Policy section shorthand for tests.
pub fn policy(
    strategy: BackoffStrategyKind,
    interval: &str,
    max_attempts: Option<u32>,
    timeout: Option<&str>,
) -> PolicySection {
    PolicySection {
        strategy,
        interval: interval.to_string(),
        max_interval: None,
        factor: None,
        max_attempts,
        timeout: timeout.map(str::to_string),
        jitter: None,
    }
}

/// Builder for `ConfigFile` with short, deterministic policies.
///
/// Defaults: start retry 3 attempts 10ms apart; poll every 100ms for at
/// most 1s; no tail; default feature flags.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.agent.start_retry = policy(BackoffStrategyKind::Constant, "10ms", Some(3), None);
        config.poll = policy(BackoffStrategyKind::Constant, "100ms", None, Some("1s"));
        Self { config }
    }

    pub fn with_poll(mut self, poll: PolicySection) -> Self {
        self.config.poll = poll;
        self
    }

    pub fn with_start_retry(mut self, start_retry: PolicySection) -> Self {
        self.config.agent.start_retry = start_retry;
        self
    }

    pub fn with_min_version(mut self, version: &str) -> Self {
        self.config.agent.min_version = Some(version.to_string());
        self
    }

    pub fn with_tail(mut self, tail: usize) -> Self {
        self.config.logs.tail = Some(tail);
        self
    }

    pub fn with_feature(mut self, name: &str, enabled: bool) -> Self {
        self.config.features.insert(name.to_string(), enabled);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StartOptions` targeting the sample deployment.
pub struct StartOptionsBuilder {
    opts: StartOptions,
}

impl StartOptionsBuilder {
    pub fn new(operation_id: &str) -> Self {
        Self {
            opts: StartOptions {
                operation_id: operation_id.to_string(),
                kind: OperationKind::Backup,
                deployment: DEPLOYMENT.to_string(),
                instance_id: INSTANCE_ID.to_string(),
                service_id: SERVICE_ID.to_string(),
                plan_id: PLAN_ID.to_string(),
                params: Params::empty(),
                schedule: None,
            },
        }
    }

    pub fn kind(mut self, kind: OperationKind) -> Self {
        self.opts.kind = kind;
        self
    }

    pub fn deployment(mut self, deployment: &str) -> Self {
        self.opts.deployment = deployment.to_string();
        self
    }

    pub fn plan(mut self, plan_id: &str) -> Self {
        self.opts.plan_id = plan_id.to_string();
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        self.opts.params = params;
        self
    }

    pub fn schedule(mut self, repeat_interval: &str) -> Self {
        self.opts.schedule = Some(ScheduleOptions {
            repeat_interval: repeat_interval.to_string(),
        });
        self
    }

    pub fn build(self) -> StartOptions {
        self.opts
    }
}

/// Catalog with one full plan and one plan that disallows backups.
pub fn sample_catalog() -> StaticCatalog {
    let mut restore_only = Plan::new(NO_BACKUP_PLAN_ID, "restore-only");
    restore_only.backup_enabled = false;
    StaticCatalog::new([Plan::new(PLAN_ID, "v1.0-xsmall"), restore_only])
}

/// An orchestrator wired to fakes, with handles kept for assertions.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub agent: Arc<FakeAgent>,
    pub store: InMemoryStore,
    pub scheduler: Arc<RecordingScheduler>,
}

impl Harness {
    pub fn new(config: ConfigFile) -> Self {
        Self::with_parts(config, FakeAgent::new(), RecordingScheduler::new())
    }

    pub fn with_parts(config: ConfigFile, agent: FakeAgent, scheduler: RecordingScheduler) -> Self {
        let agent = Arc::new(agent);
        let store = InMemoryStore::new();
        let scheduler = Arc::new(scheduler);
        let orchestrator = Orchestrator::new(
            config,
            agent.clone(),
            Arc::new(store.clone()),
            scheduler.clone(),
            Arc::new(sample_catalog()),
        );
        Self {
            orchestrator,
            agent,
            store,
            scheduler,
        }
    }
}
