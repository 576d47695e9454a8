// src/retry/engine.rs

//! Retry loop driving an async action through a [`BackoffPolicy`].

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::backoff::BackoffPolicy;

/// What an action tells the engine after one invocation.
#[derive(Debug)]
pub enum Signal<T, E> {
    /// Stop with success.
    Succeed(T),
    /// Not done yet; try again after the next interval. Carries the transient
    /// error observed on this attempt, if any.
    Retry(Option<E>),
    /// Stop with a permanent failure.
    Fail(E),
}

/// Why [`retry`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The policy ran out of attempts or time.
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last_error: Option<E>,
    },
    /// The action reported a permanent failure.
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                elapsed,
                last_error,
            } => {
                write!(f, "gave up after {attempts} attempt(s) in {elapsed:?}")?;
                if let Some(err) = last_error {
                    write!(f, ": {err}")?;
                }
                Ok(())
            }
            RetryError::Failed(err) => write!(f, "{err}"),
        }
    }
}

impl<E: StdError + 'static> StdError for RetryError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RetryError::Exhausted { last_error, .. } => {
                last_error.as_ref().map(|e| e as &(dyn StdError + 'static))
            }
            RetryError::Failed(err) => Some(err),
        }
    }
}

/// Invoke `action` until it signals success or failure, or `policy` says stop.
///
/// The first invocation happens immediately. After each `Retry` the engine
/// checks the stop predicate, then sleeps `policy.next_interval(attempt)`,
/// clamped so it never sleeps past `max_duration`.
pub async fn retry<T, E, F, Fut>(policy: &BackoffPolicy, mut action: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Signal<T, E>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);

        let last_error = match action().await {
            Signal::Succeed(value) => {
                debug!(attempt, "retry action succeeded");
                return Ok(value);
            }
            Signal::Fail(err) => {
                debug!(attempt, "retry action failed permanently");
                return Err(RetryError::Failed(err));
            }
            Signal::Retry(last_error) => last_error,
        };

        let elapsed = started.elapsed();
        if policy.should_stop(attempt, elapsed) {
            warn!(
                attempts = attempt,
                elapsed_ms = elapsed.as_millis() as u64,
                "retry budget exhausted"
            );
            return Err(RetryError::Exhausted {
                attempts: attempt,
                elapsed,
                last_error,
            });
        }

        let mut delay = policy.next_interval(attempt);
        if let Some(max) = policy.max_duration() {
            delay = delay.min(max.saturating_sub(elapsed));
        }

        debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "action asked to retry; backing off"
        );
        sleep(delay).await;
    }
}
