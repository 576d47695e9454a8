use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use backup_supervisor::agent::{
    AbortAck, Agent, AgentAddress, AgentError, AgentOperationStatus, LogLine,
};
use backup_supervisor::deployment::DeploymentName;
use backup_supervisor::mask::Params;
use backup_supervisor::operation::OperationState;
use backup_supervisor::types::OperationKind;

type StatusReply = Result<AgentOperationStatus, AgentError>;

/// Scripted in-memory agent.
///
/// - `start` and `logs` fail with their queued errors first, then succeed.
/// - `last_operation` pops scripted replies; once the script is empty the
///   last reply is repeated (defaulting to `in_progress`).
/// - every call is counted.
pub struct FakeAgent {
    address: AgentAddress,
    version: Mutex<String>,
    start_errors: Mutex<VecDeque<AgentError>>,
    statuses: Mutex<VecDeque<StatusReply>>,
    last_status: Mutex<StatusReply>,
    logs: Mutex<Vec<LogLine>>,
    log_errors: Mutex<VecDeque<AgentError>>,
    abort_reply: Mutex<Result<AbortAck, AgentError>>,
    started_params: Mutex<Vec<Params>>,

    pub resolve_calls: AtomicUsize,
    pub version_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub logs_calls: AtomicUsize,
    pub abort_calls: AtomicUsize,
}

impl FakeAgent {
    pub fn new() -> Self {
        Self {
            address: AgentAddress::new("10.11.0.2:2718"),
            version: Mutex::new("1.2.0".to_string()),
            start_errors: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            last_status: Mutex::new(Ok(status(OperationState::InProgress, None))),
            logs: Mutex::new(Vec::new()),
            log_errors: Mutex::new(VecDeque::new()),
            abort_reply: Mutex::new(Ok(AbortAck { completed: false })),
            started_params: Mutex::new(Vec::new()),
            resolve_calls: AtomicUsize::new(0),
            version_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            logs_calls: AtomicUsize::new(0),
            abort_calls: AtomicUsize::new(0),
        }
    }

    pub fn address(&self) -> &AgentAddress {
        &self.address
    }

    pub fn with_version(self, version: &str) -> Self {
        *self.version.lock().unwrap() = version.to_string();
        self
    }

    /// Queue errors returned by the next `start` calls.
    pub fn fail_start(&self, errors: impl IntoIterator<Item = AgentError>) {
        self.start_errors.lock().unwrap().extend(errors);
    }

    /// Queue replies for the next `last_operation` calls.
    pub fn push_status(&self, reply: StatusReply) {
        self.statuses.lock().unwrap().push_back(reply);
    }

    pub fn push_state(&self, state: OperationState, stage: Option<&str>) {
        self.push_status(Ok(status(state, stage)));
    }

    /// Terminal reply carrying a fixed completion time.
    pub fn push_finished(&self, state: OperationState, at: DateTime<Utc>) {
        self.push_status(Ok(AgentOperationStatus {
            state,
            stage: None,
            updated_at: Some(at),
        }));
    }

    pub fn set_logs(&self, lines: Vec<LogLine>) {
        *self.logs.lock().unwrap() = lines;
    }

    /// Queue errors returned by the next `logs` calls.
    pub fn fail_logs(&self, errors: impl IntoIterator<Item = AgentError>) {
        self.log_errors.lock().unwrap().extend(errors);
    }

    pub fn set_abort_reply(&self, reply: Result<AbortAck, AgentError>) {
        *self.abort_reply.lock().unwrap() = reply;
    }

    pub fn started_params(&self) -> Vec<Params> {
        self.started_params.lock().unwrap().clone()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl Default for FakeAgent {
    fn default() -> Self {
        Self::new()
    }
}

pub fn status(state: OperationState, stage: Option<&str>) -> AgentOperationStatus {
    AgentOperationStatus {
        state,
        stage: stage.map(str::to_string),
        updated_at: None,
    }
}

#[async_trait]
impl Agent for FakeAgent {
    async fn resolve_address(
        &self,
        _deployment: &DeploymentName,
    ) -> Result<AgentAddress, AgentError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.address.clone())
    }

    async fn version(&self, _address: &AgentAddress) -> Result<String, AgentError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.version.lock().unwrap().clone())
    }

    async fn start(
        &self,
        _address: &AgentAddress,
        _kind: OperationKind,
        params: &Params,
    ) -> Result<(), AgentError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.start_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.started_params.lock().unwrap().push(params.clone());
        Ok(())
    }

    async fn last_operation(
        &self,
        _address: &AgentAddress,
        _kind: OperationKind,
    ) -> Result<AgentOperationStatus, AgentError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        let mut last = self.last_status.lock().unwrap();
        if let Some(reply) = next {
            *last = reply;
        }
        last.clone()
    }

    async fn logs(
        &self,
        _address: &AgentAddress,
        _kind: OperationKind,
    ) -> Result<Vec<LogLine>, AgentError> {
        self.logs_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.log_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.logs.lock().unwrap().clone())
    }

    async fn abort(
        &self,
        _address: &AgentAddress,
        _kind: OperationKind,
    ) -> Result<AbortAck, AgentError> {
        self.abort_calls.fetch_add(1, Ordering::SeqCst);
        self.abort_reply.lock().unwrap().clone()
    }
}
