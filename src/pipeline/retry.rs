//! Retry module - bounded re-execution of fallible network operations
//!
//! Every network-facing step of the pipeline (image download, service call) goes
//! through [`invoke`]. The delay between attempts is fixed and blocking.

use log::{info, warn};
use std::{fmt::Display, thread::sleep, time::Duration};

// ────────────────────────────────────────────────────────────────
// Policy
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one attempt
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

// ────────────────────────────────────────────────────────────────
// Failure classification
// ────────────────────────────────────────────────────────────────

/// Decides whether another attempt could change the outcome of a failure.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error; carries the last one
    Exhausted {
        label: String,
        attempts: u32,
        last: E,
    },
    /// A non-retryable error ended the loop early
    Rejected {
        label: String,
        attempt: u32,
        error: E,
    },
}

impl<E: Display> Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted {
                label,
                attempts,
                last,
            } => write!(f, "{label} failed after {attempts} attempts: {last}"),
            Self::Rejected {
                label,
                attempt,
                error,
            } => write!(f, "{label} rejected on attempt {attempt}: {error}"),
        }
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::Rejected { error, .. } => Some(error),
        }
    }
}

impl<E> RetryError<E> {
    /// Number of attempts performed before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Rejected { attempt, .. } => *attempt,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Rejected { error, .. } => error,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// A successful result together with the attempt that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

// ────────────────────────────────────────────────────────────────
// Invoker
// ────────────────────────────────────────────────────────────────

/// Run `op` until it succeeds, fails with a non-retryable error, or the policy's
/// attempt budget is spent. The first success returns immediately.
pub fn invoke<T, E, F>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<Retried<T>, RetryError<E>>
where
    E: Retryable + Display,
    F: FnMut(u32) -> Result<T, E>,
{
    let max = policy.max_attempts();

    for attempt in 1..=max {
        info!("{} attempt {}/{}", label, attempt, max);
        match op(attempt) {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts: attempt,
                });
            }
            Err(e) if !e.is_retryable() => {
                warn!("{} attempt {}/{} rejected: {}", label, attempt, max, e);
                return Err(RetryError::Rejected {
                    label: label.to_string(),
                    attempt,
                    error: e,
                });
            }
            Err(e) if attempt < max => {
                warn!(
                    "{} attempt {}/{} failed: {}. Retrying in {:?}…",
                    label,
                    attempt,
                    max,
                    e,
                    policy.delay(),
                );
                sleep(policy.delay());
            }
            Err(e) => {
                warn!("{} attempt {}/{} failed: {}", label, attempt, max, e);
                return Err(RetryError::Exhausted {
                    label: label.to_string(),
                    attempts: attempt,
                    last: e,
                });
            }
        }
    }

    unreachable!("retry policy always allows at least one attempt")
}
