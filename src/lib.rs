// src/lib.rs

pub mod agent;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod deployment;
pub mod errors;
pub mod logging;
pub mod mask;
pub mod operation;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod stream;
pub mod supervisor;
pub mod types;
pub mod version;

use std::cmp::Ordering;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::{load_and_validate, ConfigFile, Feature, RawConfigFile};
use crate::mask::{mask_sensitive, Params};
use crate::stream::demux;

pub use crate::errors::SupervisorError;
pub use crate::orchestrator::Orchestrator;
pub use crate::supervisor::{Supervisor, SupervisorEvent};

/// High-level entry point used by `main.rs`.
///
/// Dispatches one subcommand. Only `check-config` requires the config file
/// to exist; the other commands fall back to built-in defaults.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = Path::new(&args.config);

    match args.command {
        Command::CheckConfig => {
            let cfg = load_and_validate(config_path)
                .with_context(|| format!("invalid config {}", config_path.display()))?;
            print_config(&cfg);
        }
        Command::Mask { file } => {
            let raw = read_input(&file)?;
            let params: Params = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON parameter bag", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&mask_sensitive(&params))?);
        }
        Command::Demux { file, tail } => {
            let cfg = config_or_default(config_path)?;
            let tail = tail.or(cfg.log_tail);
            let reader = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("failed to open {}", file.display()))?;
            let output = demux(reader, tail).await?;
            if output.is_truncated() {
                info!(file = %file.display(), "output truncated to last {tail:?} lines");
            }
            let [stdout, stderr] = output.into_text();
            println!("=== stdout ===");
            print!("{stdout}");
            println!("=== stderr ===");
            print!("{stderr}");
        }
        Command::CompareVersions { a, b } => {
            let ordering = version::compare_versions(&a, &b)?;
            let n = match ordering {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            };
            println!("{n}");
        }
        Command::ValidateDeployment { name } => {
            let cfg = config_or_default(config_path)?;
            let parsed = cfg.deployment.parse(&name)?;
            println!("deployment {parsed}");
            println!("  subnet: {}", parsed.subnet().unwrap_or("-"));
            println!(
                "  network segment: {} (index {})",
                parsed.network_segment(),
                parsed.network_index()
            );
            println!("  guid: {}", parsed.guid());
        }
    }

    Ok(())
}

/// Load the config if it exists, otherwise use the built-in defaults.
fn config_or_default(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        return Ok(load_and_validate(path)
            .with_context(|| format!("invalid config {}", path.display()))?);
    }
    debug!(path = %path.display(), "config file not found; using defaults");
    Ok(ConfigFile::try_from(RawConfigFile::default())?)
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_config(cfg: &ConfigFile) {
    println!("backup-supervisor config");
    println!(
        "  deployment: prefix = {:?}, network_segment_length = {}",
        cfg.deployment.prefix(),
        cfg.deployment.network_segment_length()
    );
    println!("  agent.start_retry: {}", describe_policy(&cfg.start_retry));
    match cfg.min_agent_version {
        Some(v) => println!("  agent.min_version: {v}"),
        None => println!("  agent.min_version: (any)"),
    }
    println!("  poll: {}", describe_policy(&cfg.poll));
    match cfg.log_tail {
        Some(n) => println!("  logs.tail: {n}"),
        None => println!("  logs.tail: (unbounded)"),
    }
    println!("  features:");
    for feature in Feature::ALL {
        println!("    {feature} = {}", cfg.features.is_enabled(feature));
    }

    debug!("config check complete");
}

fn describe_policy(policy: &retry::BackoffPolicy) -> String {
    let mut out = match policy.backoff() {
        retry::Backoff::Constant(interval) => format!("constant {interval:?}"),
        retry::Backoff::Exponential {
            initial,
            factor,
            max,
        } => format!("exponential {initial:?} x{factor} up to {max:?}"),
    };
    if let Some(n) = policy.max_attempts() {
        out.push_str(&format!(", max_attempts = {n}"));
    }
    if let Some(d) = policy.max_duration() {
        out.push_str(&format!(", timeout = {d:?}"));
    }
    out
}
