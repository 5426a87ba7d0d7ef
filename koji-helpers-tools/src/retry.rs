//! Bounded retry for transient collaborator failures.

use std::fmt::Display;
use std::thread::sleep;
use std::time::Duration;

use koji_helpers_core::config::RetryConfig;

/// Fixed attempt count with a fixed rest between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub rest: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, rest: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            rest,
        }
    }

    /// Single attempt, no resting. Handy in tests.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `op` until it succeeds or attempts run out.
    ///
    /// Every failure is logged at warn level; giving up is logged at error
    /// level and yields `None` so the caller can skip `subject` for this
    /// cycle.
    pub fn run<T, E, F>(&self, subject: &str, mut op: F) -> Option<T>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        for attempt in 1..=self.attempts {
            if attempt > 1 {
                tracing::info!(
                    subject,
                    attempt,
                    attempts = self.attempts,
                    rest_secs = self.rest.as_secs_f64(),
                    "will retry after resting",
                );
                sleep(self.rest);
            }
            match op() {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(subject, attempt, "success, at last");
                    }
                    return Some(value);
                }
                Err(err) => {
                    tracing::warn!(subject, attempt, error = %err, "attempt failed");
                }
            }
        }
        tracing::error!(subject, "giving up on subject for this cycle");
        None
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(RetryConfig::default())
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(config.attempts, config.rest.as_duration())
    }
}
