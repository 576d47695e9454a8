// src/deployment.rs

//! Deployment name grammar.
//!
//! `<prefix>[_<subnet>]-<N-digit network segment>-<UUID>`, e.g.
//! `service-fabrik-0021-b4719e7c-e8d3-4f7f-c515-769ad1c3ebfa`. The prefix and
//! the digit count `N` come from `[deployment]` config.

use std::fmt;

use regex::Regex;

use crate::errors::{Result, SupervisorError};

const GUID_PATTERN: &str = "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";

/// Compiled grammar for one `(prefix, network_segment_length)` pair.
#[derive(Debug, Clone)]
pub struct DeploymentGrammar {
    prefix: String,
    network_segment_length: usize,
    regex: Regex,
}

impl DeploymentGrammar {
    pub fn new(prefix: &str, network_segment_length: usize) -> Result<Self> {
        if prefix.is_empty() {
            return Err(SupervisorError::ConfigError(
                "[deployment].prefix must not be empty".to_string(),
            ));
        }
        if network_segment_length == 0 {
            return Err(SupervisorError::ConfigError(
                "[deployment].network_segment_length must be >= 1 (got 0)".to_string(),
            ));
        }

        let pattern = format!(
            r"^({})(?:_([a-z0-9]+))?-([0-9]{{{}}})-({})$",
            regex::escape(prefix),
            network_segment_length,
            GUID_PATTERN
        );
        let regex = Regex::new(&pattern)
            .map_err(|e| SupervisorError::ConfigError(format!("invalid deployment grammar: {e}")))?;

        Ok(Self {
            prefix: prefix.to_string(),
            network_segment_length,
            regex,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn network_segment_length(&self) -> usize {
        self.network_segment_length
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// Parse and validate a deployment name.
    pub fn parse(&self, name: &str) -> Result<DeploymentName> {
        let caps = self.regex.captures(name).ok_or_else(|| {
            SupervisorError::Validation(format!(
                "deployment name '{name}' does not match '{}[_<subnet>]-<{} digits>-<guid>'",
                self.prefix, self.network_segment_length
            ))
        })?;

        let network_segment = caps[3].to_string();
        let network_index = network_segment.parse::<u64>().map_err(|e| {
            SupervisorError::Validation(format!(
                "deployment name '{name}' has invalid network segment: {e}"
            ))
        })?;

        Ok(DeploymentName {
            name: name.to_string(),
            subnet: caps.get(2).map(|m| m.as_str().to_string()),
            network_segment,
            network_index,
            guid: caps[4].to_string(),
        })
    }

    /// Build a name from its components (inverse of [`Self::parse`]).
    pub fn format(&self, subnet: Option<&str>, network_index: u64, guid: &str) -> Result<DeploymentName> {
        let subnet = subnet.map(|s| format!("_{s}")).unwrap_or_default();
        let name = format!(
            "{}{}-{:0width$}-{}",
            self.prefix,
            subnet,
            network_index,
            guid,
            width = self.network_segment_length
        );
        self.parse(&name)
    }
}

/// A deployment name known to match the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentName {
    name: String,
    subnet: Option<String>,
    network_segment: String,
    network_index: u64,
    guid: String,
}

impl DeploymentName {
    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn subnet(&self) -> Option<&str> {
        self.subnet.as_deref()
    }

    /// The zero-padded network segment as written in the name.
    pub fn network_segment(&self) -> &str {
        &self.network_segment
    }

    pub fn network_index(&self) -> u64 {
        self.network_index
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
