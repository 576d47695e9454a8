// src/retry/backoff.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Perturbs a computed interval.
///
/// Injected into a [`BackoffPolicy`] so call sites never change when jitter
/// is switched on or off.
pub trait Jitter: Send + Sync + fmt::Debug {
    fn apply(&self, interval: Duration, attempt: u32) -> Duration;
}

/// Identity jitter (the default).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl Jitter for NoJitter {
    fn apply(&self, interval: Duration, _attempt: u32) -> Duration {
        interval
    }
}

/// Uniform jitter of `±fraction` around the computed interval.
#[derive(Debug, Clone, Copy)]
pub struct ProportionalJitter {
    fraction: f64,
}

impl ProportionalJitter {
    /// `fraction` is clamped into `0.0..=1.0`.
    pub fn new(fraction: f64) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
        }
    }
}

impl Jitter for ProportionalJitter {
    fn apply(&self, interval: Duration, _attempt: u32) -> Duration {
        let base = interval.as_secs_f64();
        let offset = (fastrand::f64() * 2.0 - 1.0) * base * self.fraction;
        Duration::from_secs_f64((base + offset).max(0.0))
    }
}

/// How the wait interval grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Always wait the same amount.
    Constant(Duration),
    /// `initial * factor^(attempt - 1)`, capped at `max`.
    Exponential {
        initial: Duration,
        factor: u32,
        max: Duration,
    },
}

/// Interval computation plus stop predicate.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    backoff: Backoff,
    max_attempts: Option<u32>,
    max_duration: Option<Duration>,
    jitter: Arc<dyn Jitter>,
}

impl BackoffPolicy {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            backoff,
            max_attempts: None,
            max_duration: None,
            jitter: Arc::new(NoJitter),
        }
    }

    pub fn constant(interval: Duration) -> Self {
        Self::new(Backoff::Constant(interval))
    }

    /// Exponential doubling from `initial`, never waiting longer than `max`.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self::new(Backoff::Exponential {
            initial,
            factor: 2,
            max,
        })
    }

    /// Change the growth factor of an exponential policy (no-op for constant).
    pub fn with_factor(mut self, factor: u32) -> Self {
        if let Backoff::Exponential { initial, max, .. } = self.backoff {
            self.backoff = Backoff::Exponential {
                initial,
                factor: factor.max(1),
                max,
            };
        }
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    pub fn with_jitter(mut self, jitter: impl Jitter + 'static) -> Self {
        self.jitter = Arc::new(jitter);
        self
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration
    }

    /// Wait before the attempt following `attempt` (1-based).
    pub fn next_interval(&self, attempt: u32) -> Duration {
        let raw = match self.backoff {
            Backoff::Constant(interval) => interval,
            Backoff::Exponential {
                initial,
                factor,
                max,
            } => {
                let exp = attempt.saturating_sub(1);
                let multiplier = factor.checked_pow(exp).unwrap_or(u32::MAX);
                initial.saturating_mul(multiplier).min(max)
            }
        };
        self.jitter.apply(raw, attempt)
    }

    /// True once `attempts` invocations or `elapsed` time use up the budget.
    pub fn should_stop(&self, attempts: u32, elapsed: Duration) -> bool {
        let attempts_spent = self.max_attempts.is_some_and(|max| attempts >= max);
        let time_spent = self.max_duration.is_some_and(|max| elapsed >= max);
        attempts_spent || time_spent
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::constant(Duration::from_secs(1))
    }
}
