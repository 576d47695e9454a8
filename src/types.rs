// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of job an agent executes for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Backup,
    Restore,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Backup => "backup",
            OperationKind::Restore => "restore",
        }
    }

    /// Capitalised label used in human-readable descriptions.
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Backup => "Backup",
            OperationKind::Restore => "Restore",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "backup" => Ok(OperationKind::Backup),
            "restore" => Ok(OperationKind::Restore),
            other => Err(format!(
                "invalid operation kind: {other} (expected \"backup\" or \"restore\")"
            )),
        }
    }
}

/// Interval strategy for a backoff policy as written in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategyKind {
    Constant,
    Exponential,
}

impl Default for BackoffStrategyKind {
    fn default() -> Self {
        BackoffStrategyKind::Constant
    }
}
