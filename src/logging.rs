// src/logging.rs

//! Logging setup for `backup-supervisor` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `BACKUP_SUPERVISOR_LOG` environment variable, either a bare level
//!    ("debug") or full directives ("backup_supervisor::orchestrator=debug,info")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that command stdout carries only command
//! output (masked JSON, demultiplexed logs).

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "BACKUP_SUPERVISOR_LOG";

/// Initialise global logging subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

/// Resolve the effective filter from the CLI flag and the env var value.
///
/// An unparseable env value falls back to `info` instead of failing startup.
pub fn build_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(directive_for(level));
    }

    env_value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| EnvFilter::try_new(normalize(s)).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn directive_for(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// `warning` is accepted as an alias for `warn`.
fn normalize(value: &str) -> String {
    if value.eq_ignore_ascii_case("warning") {
        "warn".to_string()
    } else {
        value.to_lowercase()
    }
}
