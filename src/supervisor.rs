// src/supervisor.rs

//! Background watch loops over running operations.
//!
//! Each watched operation gets its own Tokio task that repeats
//! [`Orchestrator::get_operation_state`] until the operation is terminal,
//! pausing one poll interval between rounds.
//! There is at most one loop per operation id: watching an id again cancels
//! the previous loop before the new one starts.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::errors::{Result, SupervisorError};
use crate::orchestrator::{Orchestrator, PollOptions, PollOutcome};
use crate::types::OperationKind;

/// Emitted once per watch loop that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    Finished {
        operation_id: String,
        outcome: PollOutcome,
    },
    Failed {
        operation_id: String,
        error: String,
    },
}

impl SupervisorEvent {
    pub fn operation_id(&self) -> &str {
        match self {
            SupervisorEvent::Finished { operation_id, .. }
            | SupervisorEvent::Failed { operation_id, .. } => operation_id,
        }
    }
}

/// Handle for a running watch loop.
struct ActiveWatch {
    cancel: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

pub struct Supervisor {
    orchestrator: Orchestrator,
    events: mpsc::Sender<SupervisorEvent>,
    active: HashMap<String, ActiveWatch>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("orchestrator", &self.orchestrator)
            .field("active", &self.active.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Create a supervisor and the receiving end of its event channel.
    pub fn new(
        orchestrator: Orchestrator,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<SupervisorEvent>) {
        let (events, rx) = mpsc::channel(capacity.max(1));
        let supervisor = Self {
            orchestrator,
            events,
            active: HashMap::new(),
        };
        (supervisor, rx)
    }

    /// Start watching an operation. `opts.operation_id` is required.
    pub fn watch(&mut self, kind: OperationKind, opts: PollOptions) -> Result<()> {
        let operation_id = opts.operation_id.clone().ok_or_else(|| {
            SupervisorError::Validation("watching requires an operation id".to_string())
        })?;

        self.active.retain(|_, watch| !watch.handle.is_finished());

        if let Some(mut existing) = self.active.remove(&operation_id) {
            info!(operation_id = %operation_id, "replacing existing watch loop");
            cancel_watch(&operation_id, &mut existing);
        }

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let orchestrator = self.orchestrator.clone();
        let events = self.events.clone();
        let id = operation_id.clone();

        let handle = tokio::spawn(async move {
            watch_loop(orchestrator, kind, opts, id, events, cancel_rx).await;
        });

        self.active.insert(
            operation_id,
            ActiveWatch {
                cancel: Some(cancel_tx),
                handle,
            },
        );
        Ok(())
    }

    /// Stop the loop for `operation_id`. Returns false if none was running.
    pub fn cancel(&mut self, operation_id: &str) -> bool {
        match self.active.remove(operation_id) {
            Some(mut watch) if !watch.handle.is_finished() => {
                cancel_watch(operation_id, &mut watch);
                true
            }
            _ => false,
        }
    }

    /// Number of loops still running.
    pub fn active_count(&self) -> usize {
        self.active
            .values()
            .filter(|watch| !watch.handle.is_finished())
            .count()
    }

    /// Cancel every loop and wait for them to exit.
    pub async fn shutdown(mut self) {
        for (id, mut watch) in self.active.drain() {
            cancel_watch(&id, &mut watch);
            if let Err(e) = watch.handle.await {
                warn!(operation_id = %id, error = %e, "watch loop panicked");
            }
        }
        info!("supervisor stopped");
    }
}

fn cancel_watch(operation_id: &str, watch: &mut ActiveWatch) {
    if let Some(cancel) = watch.cancel.take() {
        if cancel.send(()).is_err() {
            debug!(operation_id = %operation_id, "watch loop already finished while cancelling");
        }
    }
}

async fn watch_loop(
    orchestrator: Orchestrator,
    kind: OperationKind,
    opts: PollOptions,
    operation_id: String,
    events: mpsc::Sender<SupervisorEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    debug!(operation_id = %operation_id, kind = %kind, "watch loop started");
    let mut rounds: u32 = 0;

    let event = loop {
        rounds += 1;
        let polled = tokio::select! {
            biased;
            _ = &mut cancel_rx => {
                info!(operation_id = %operation_id, rounds, "watch loop cancelled");
                return;
            }
            polled = orchestrator.get_operation_state(kind, opts.clone()) => polled,
        };

        match polled {
            Ok(PollOutcome::InProgress { stage, .. }) => {
                let pause = orchestrator.config().poll.next_interval(rounds);
                debug!(
                    operation_id = %operation_id,
                    rounds,
                    stage = ?stage,
                    pause_ms = pause.as_millis() as u64,
                    "still running; polling again"
                );
                tokio::select! {
                    biased;
                    _ = &mut cancel_rx => {
                        info!(operation_id = %operation_id, rounds, "watch loop cancelled");
                        return;
                    }
                    _ = sleep(pause) => {}
                }
            }
            Ok(outcome) => {
                info!(
                    operation_id = %operation_id,
                    state = %outcome.state(),
                    rounds,
                    "watched operation finished"
                );
                break SupervisorEvent::Finished {
                    operation_id: operation_id.clone(),
                    outcome,
                };
            }
            Err(e) => {
                warn!(operation_id = %operation_id, error = %e, "watch loop failed");
                break SupervisorEvent::Failed {
                    operation_id: operation_id.clone(),
                    error: e.to_string(),
                };
            }
        }
    };

    if events.send(event).await.is_err() {
        debug!(operation_id = %operation_id, "event receiver dropped");
    }
}
