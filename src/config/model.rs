// src/config/model.rs

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::deployment::DeploymentGrammar;
use crate::errors::{Result, SupervisorError};
use crate::retry::BackoffPolicy;
use crate::types::BackoffStrategyKind;
use crate::version::Version;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [deployment]
/// prefix = "service-fabrik"
/// network_segment_length = 4
///
/// [agent]
/// min_version = "1.0.0"
/// start_retry = { strategy = "constant", interval = "1s", max_attempts = 3 }
///
/// [poll]
/// strategy = "exponential"
/// interval = "1s"
/// max_interval = "30s"
/// timeout = "5m"
///
/// [logs]
/// tail = 1000
///
/// [features]
/// scheduled_backup = true
/// ```
///
/// All sections are optional and have reasonable defaults. Unknown keys are
/// rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub deployment: DeploymentSection,

    #[serde(default)]
    pub agent: AgentSection,

    #[serde(default = "default_poll_policy")]
    pub poll: PolicySection,

    #[serde(default)]
    pub logs: LogsSection,

    /// Feature flags by name; see [`Feature`].
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
}

impl Default for RawConfigFile {
    fn default() -> Self {
        Self {
            deployment: DeploymentSection::default(),
            agent: AgentSection::default(),
            poll: default_poll_policy(),
            logs: LogsSection::default(),
            features: BTreeMap::new(),
        }
    }
}

/// `[deployment]` section: the deployment name grammar constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentSection {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_network_segment_length")]
    pub network_segment_length: usize,
}

fn default_prefix() -> String {
    "service-fabrik".to_string()
}

fn default_network_segment_length() -> usize {
    4
}

impl Default for DeploymentSection {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            network_segment_length: default_network_segment_length(),
        }
    }
}

/// `[agent]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSection {
    /// Immediate-retry budget for address resolution and the start call.
    #[serde(default = "default_start_retry")]
    pub start_retry: PolicySection,

    /// Oldest agent version `start` will talk to.
    #[serde(default)]
    pub min_version: Option<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            start_retry: default_start_retry(),
            min_version: None,
        }
    }
}

/// A backoff policy as written in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySection {
    #[serde(default)]
    pub strategy: BackoffStrategyKind,

    /// Constant interval, or the first interval of an exponential policy.
    pub interval: String,

    /// Cap for exponential intervals; defaults to 30s.
    #[serde(default)]
    pub max_interval: Option<String>,

    /// Growth factor for exponential intervals; defaults to 2.
    #[serde(default)]
    pub factor: Option<u32>,

    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Maximum elapsed time across all attempts.
    #[serde(default)]
    pub timeout: Option<String>,

    /// Jitter fraction in `0.0..=1.0`.
    #[serde(default)]
    pub jitter: Option<f64>,
}

fn default_start_retry() -> PolicySection {
    PolicySection {
        strategy: BackoffStrategyKind::Constant,
        interval: "1s".to_string(),
        max_interval: None,
        factor: None,
        max_attempts: Some(3),
        timeout: None,
        jitter: None,
    }
}

fn default_poll_policy() -> PolicySection {
    PolicySection {
        strategy: BackoffStrategyKind::Exponential,
        interval: "1s".to_string(),
        max_interval: Some("30s".to_string()),
        factor: None,
        max_attempts: None,
        timeout: Some("5m".to_string()),
        jitter: None,
    }
}

/// `[logs]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogsSection {
    /// Lines kept per channel; unbounded when absent.
    #[serde(default)]
    pub tail: Option<usize>,
}

/// Known feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Register recurring backups with the scheduler on `start`.
    ScheduledBackup,
    /// Fetch and persist agent logs when an operation finishes.
    LogCapture,
}

impl Feature {
    pub const ALL: [Feature; 2] = [Feature::ScheduledBackup, Feature::LogCapture];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::ScheduledBackup => "scheduled_backup",
            Feature::LogCapture => "log_capture",
        }
    }

    fn default_enabled(&self) -> bool {
        match self {
            Feature::ScheduledBackup => false,
            Feature::LogCapture => true,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| SupervisorError::Validation(format!("undefined feature '{s}'")))
    }
}

/// Resolved feature flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Features {
    enabled: HashMap<Feature, bool>,
}

impl Features {
    pub fn set(mut self, feature: Feature, enabled: bool) -> Self {
        self.enabled.insert(feature, enabled);
        self
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled
            .get(&feature)
            .copied()
            .unwrap_or_else(|| feature.default_enabled())
    }

    /// Look up a flag by its config name; undefined names are an error.
    pub fn is_enabled_by_name(&self, name: &str) -> Result<bool> {
        let feature: Feature = name.parse()?;
        Ok(self.is_enabled(feature))
    }
}

impl Default for Features {
    fn default() -> Self {
        Self {
            enabled: Feature::ALL
                .into_iter()
                .map(|f| (f, f.default_enabled()))
                .collect(),
        }
    }
}

/// Validated configuration.
///
/// Can only be built through `TryFrom<RawConfigFile>` (see `validate.rs`) or
/// [`ConfigFile::new_unchecked`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub deployment: DeploymentGrammar,
    pub start_retry: BackoffPolicy,
    pub poll: BackoffPolicy,
    pub min_agent_version: Option<Version>,
    pub log_tail: Option<usize>,
    pub features: Features,
}

impl ConfigFile {
    pub fn new_unchecked(
        deployment: DeploymentGrammar,
        start_retry: BackoffPolicy,
        poll: BackoffPolicy,
        min_agent_version: Option<Version>,
        log_tail: Option<usize>,
        features: Features,
    ) -> Self {
        Self {
            deployment,
            start_retry,
            poll,
            min_agent_version,
            log_tail,
            features,
        }
    }
}
