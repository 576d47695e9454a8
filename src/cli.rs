// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! The binary exercises the offline parts of the supervisor: config
//! validation, parameter masking, framed log demultiplexing, version
//! comparison and deployment name checks.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `backup-supervisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "backup-supervisor",
    version,
    about = "Supervise agent-executed backup and restore operations.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `BackupSupervisor.toml` in the current working directory.
    #[arg(long, global = true, value_name = "PATH", default_value = "BackupSupervisor.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BACKUP_SUPERVISOR_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Parse and validate the config file, then print the effective settings.
    CheckConfig,

    /// Print a JSON parameter bag with sensitive values masked.
    Mask {
        /// JSON file to read; `-` reads stdin.
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Split a framed stdout/stderr capture into its two channels.
    Demux {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Keep only the last N lines per channel (overrides `[logs].tail`).
        #[arg(long, value_name = "N")]
        tail: Option<usize>,
    },

    /// Compare two dotted versions; prints -1, 0 or 1.
    CompareVersions { a: String, b: String },

    /// Check a deployment name against the configured grammar.
    ValidateDeployment { name: String },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
