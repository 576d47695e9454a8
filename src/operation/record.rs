// src/operation/record.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::OperationState;
use crate::stream::ChannelLog;
use crate::types::OperationKind;

/// Externalised status record of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub id: String,
    pub kind: OperationKind,
    pub deployment: String,
    pub instance_id: String,
    pub state: OperationState,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub agent_address: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub logs: LogStreams,
    #[serde(default)]
    pub truncated: Truncation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStreams {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncation {
    pub stdout: bool,
    pub stderr: bool,
}

/// Tail-limited logs ready to be persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedLogs {
    pub logs: LogStreams,
    pub truncated: Truncation,
}

impl CapturedLogs {
    pub fn from_channels(stdout: ChannelLog, stderr: ChannelLog) -> Self {
        let truncated = Truncation {
            stdout: stdout.truncated(),
            stderr: stderr.truncated(),
        };
        Self {
            logs: LogStreams {
                stdout: stdout.into_lines(),
                stderr: stderr.into_lines(),
            },
            truncated,
        }
    }
}
