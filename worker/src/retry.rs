//! Retry wrapper for flaky operations.
//!
//! Registry inspection goes over the network through an external tool
//! and fails transiently; the wrapper re-invokes the operation up to a
//! configured number of attempts. There is no backoff: the retried
//! calls are cheap relative to the latency budget of a build request.

use forge_core::error::{ForgeError, Result};

/// How many total attempts an operation gets.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    attempts: u32,
}

impl RetryPolicy {
    /// A policy with the given total attempts, at least 1.
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Invoke `op`, retrying failures matching `is_retryable` until the
/// policy's attempts are exhausted.
///
/// The final failure is returned unchanged. Failures outside the
/// retryable class propagate immediately.
pub fn with_retry<T, F, P>(policy: &RetryPolicy, is_retryable: P, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
    P: Fn(&ForgeError) -> bool,
{
    let mut remaining = policy.attempts();
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) => {
                remaining -= 1;
                if remaining == 0 {
                    tracing::error!(
                        attempts = policy.attempts(),
                        error = %err,
                        "The maximum number of attempts have failed"
                    );
                    return Err(err);
                }
                tracing::warn!(error = %err, "Operation failed. Retrying now");
            }
            Err(err) => return Err(err),
        }
    }
}
