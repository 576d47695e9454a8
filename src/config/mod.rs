// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it into typed policies, grammar and feature flags (`validate.rs`).
//! - Parse human duration strings like `"3s"` (`duration.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    AgentSection, ConfigFile, DeploymentSection, Feature, Features, LogsSection, PolicySection,
    RawConfigFile,
};
