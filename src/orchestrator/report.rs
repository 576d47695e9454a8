// src/orchestrator/report.rs

//! Log truncation and human-readable descriptions.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::agent::LogLine;
use crate::operation::{CapturedLogs, OperationState};
use crate::stream::{Channel, TailBuffer};
use crate::types::OperationKind;

/// Split agent output per channel and keep the last `tail` lines of each.
pub fn capture_logs(lines: Vec<LogLine>, tail: Option<usize>) -> CapturedLogs {
    let mut stdout = TailBuffer::new(Channel::Stdout, tail);
    let mut stderr = TailBuffer::new(Channel::Stderr, tail);

    for LogLine { channel, line } in lines {
        match channel {
            Channel::Stdout => stdout.push(line),
            Channel::Stderr => stderr.push(line),
        }
    }

    CapturedLogs::from_channels(stdout.finish(), stderr.finish())
}

/// `"Backup deployment <name> succeeded at 2024-01-02T03:04:05.000Z"`.
pub fn describe_terminal(
    kind: OperationKind,
    deployment: &str,
    state: OperationState,
    at: DateTime<Utc>,
) -> String {
    format!(
        "{} deployment {} {} at {}",
        kind.label(),
        deployment,
        state,
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

pub fn describe_running(kind: OperationKind, deployment: &str, stage: Option<&str>) -> String {
    match stage {
        Some(stage) => format!(
            "{} deployment {} is still in progress (stage: {})",
            kind.label(),
            deployment,
            stage
        ),
        None => format!("{} deployment {} is still in progress", kind.label(), deployment),
    }
}
