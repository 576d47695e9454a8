// src/config/validate.rs

use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, Feature, Features, PolicySection, RawConfigFile};
use crate::deployment::DeploymentGrammar;
use crate::errors::{Result, SupervisorError};
use crate::retry::{BackoffPolicy, ProportionalJitter};
use crate::types::BackoffStrategyKind;
use crate::version::Version;

const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(30);

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SupervisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let deployment = DeploymentGrammar::new(
            &raw.deployment.prefix,
            raw.deployment.network_segment_length,
        )?;
        let start_retry = build_policy("[agent].start_retry", &raw.agent.start_retry)?;
        let poll = build_policy("[poll]", &raw.poll)?;
        let min_agent_version = validate_min_version(raw.agent.min_version.as_deref())?;
        let features = validate_features(&raw)?;

        Ok(ConfigFile::new_unchecked(
            deployment,
            start_retry,
            poll,
            min_agent_version,
            raw.logs.tail,
            features,
        ))
    }
}

/// Turn a `PolicySection` into a `BackoffPolicy`, checking every field.
pub fn build_policy(section: &str, raw: &PolicySection) -> Result<BackoffPolicy> {
    let interval = section_duration(section, "interval", &raw.interval)?;
    if interval.is_zero() {
        return Err(SupervisorError::ConfigError(format!(
            "{section}.interval must be > 0"
        )));
    }

    let mut policy = match raw.strategy {
        BackoffStrategyKind::Constant => {
            if raw.max_interval.is_some() || raw.factor.is_some() {
                return Err(SupervisorError::ConfigError(format!(
                    "{section}: max_interval/factor only apply to strategy = \"exponential\""
                )));
            }
            BackoffPolicy::constant(interval)
        }
        BackoffStrategyKind::Exponential => {
            let max = match raw.max_interval.as_deref() {
                Some(s) => section_duration(section, "max_interval", s)?,
                None => DEFAULT_MAX_INTERVAL,
            };
            if max < interval {
                return Err(SupervisorError::ConfigError(format!(
                    "{section}.max_interval ({max:?}) must be >= interval ({interval:?})"
                )));
            }
            let factor = raw.factor.unwrap_or(2);
            if factor < 2 {
                return Err(SupervisorError::ConfigError(format!(
                    "{section}.factor must be >= 2 (got {factor})"
                )));
            }
            BackoffPolicy::exponential(interval, max).with_factor(factor)
        }
    };

    if let Some(max_attempts) = raw.max_attempts {
        if max_attempts == 0 {
            return Err(SupervisorError::ConfigError(format!(
                "{section}.max_attempts must be >= 1 (got 0)"
            )));
        }
        policy = policy.with_max_attempts(max_attempts);
    }

    if let Some(timeout) = raw.timeout.as_deref() {
        policy = policy.with_max_duration(section_duration(section, "timeout", timeout)?);
    }

    if let Some(jitter) = raw.jitter {
        if !(0.0..=1.0).contains(&jitter) {
            return Err(SupervisorError::ConfigError(format!(
                "{section}.jitter must be within 0.0..=1.0 (got {jitter})"
            )));
        }
        policy = policy.with_jitter(ProportionalJitter::new(jitter));
    }

    if policy.max_attempts().is_none() && policy.max_duration().is_none() {
        return Err(SupervisorError::ConfigError(format!(
            "{section} needs max_attempts or timeout"
        )));
    }

    Ok(policy)
}

fn section_duration(section: &str, field: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|e| SupervisorError::ConfigError(format!("{section}.{field}: {e}")))
}

fn validate_min_version(raw: Option<&str>) -> Result<Option<Version>> {
    raw.map(|s| {
        s.parse::<Version>().map_err(|e| {
            SupervisorError::ConfigError(format!("[agent].min_version: {e}"))
        })
    })
    .transpose()
}

fn validate_features(raw: &RawConfigFile) -> Result<Features> {
    let mut features = Features::default();
    for (name, enabled) in raw.features.iter() {
        let feature: Feature = name.parse().map_err(|_| {
            SupervisorError::ConfigError(format!("unknown feature flag '{name}' in [features]"))
        })?;
        features = features.set(feature, *enabled);
    }
    Ok(features)
}
