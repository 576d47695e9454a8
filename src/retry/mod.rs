// src/retry/mod.rs

//! Generic retry / poll engine.
//!
//! - [`backoff`] computes successive wait intervals and the stop predicate
//!   (max attempts / max elapsed time). It is pure and owns no state beyond
//!   its parameters.
//! - [`engine`] drives an async action through a [`BackoffPolicy`] until the
//!   action reports success, permanent failure, or the policy gives up.
//!
//! All I/O lives inside the action; the engine only sleeps between attempts.

pub mod backoff;
pub mod engine;

pub use backoff::{Backoff, BackoffPolicy, Jitter, NoJitter, ProportionalJitter};
pub use engine::{retry, RetryError, Signal};
