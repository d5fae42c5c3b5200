//! Bounded retry with exponential backoff for transient backend
//! failures.

use std::fmt;
use std::time::Duration;

/// Retry budget for an operation class.
///
/// Source resolution and frame decoding are retried; encoding is not,
/// since a failed encoder leaves the output stream in an unknown
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles per attempt.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds or attempts are exhausted, sleeping
    /// between attempts. Intended for blocking worker contexts.
    pub fn run<T, E: fmt::Display>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, E>,
    ) -> Result<T, E> {
        let attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut last_err = None;
        for attempt in 1..=attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt < attempts {
                        tracing::warn!(%err, what, attempt, "Retrying after failure");
                        std::thread::sleep(backoff);
                        backoff = backoff.saturating_mul(2);
                    }
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.expect("at least one attempt runs"))
    }
}
