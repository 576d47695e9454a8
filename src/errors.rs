// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

use crate::agent::AgentError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("agent for deployment '{deployment}' unreachable: {source}")]
    AgentUnreachable {
        deployment: String,
        #[source]
        source: AgentError,
    },

    #[error("agent for deployment '{deployment}' failed: {source}")]
    Agent {
        deployment: String,
        #[source]
        source: AgentError,
    },

    #[error("no operation found for deployment '{deployment}' / instance '{instance_id}'")]
    OperationNotFound {
        deployment: String,
        instance_id: String,
    },

    #[error("retry budget exhausted after {attempts} attempt(s) in {elapsed:?}{}", cause_suffix(.last_error))]
    RetryExhausted {
        attempts: u32,
        elapsed: Duration,
        last_error: Option<String>,
    },

    #[error("resource store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn cause_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(": {e}"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
