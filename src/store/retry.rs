use std::thread;
use std::time::Duration;

use crate::error::RemoteError;

/// How often, and how patiently, a single remote store call is attempted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(0),
        }
    }

    /// Runs `op` until it succeeds, fails with an error `retryable` rejects,
    /// or the attempts run out. The last error is returned.
    pub fn run<T, F, P>(&self, what: &str, retryable: P, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Result<T, RemoteError>,
        P: Fn(&RemoteError) -> bool,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && retryable(&e) => {
                    warn!("{} failed (attempt {} of {}): {}, retrying in {:?}", what, attempt, attempts, e, self.delay);
                    if self.delay > Duration::from_millis(0) {
                        thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
                Err(e) => {
                    debug!("{} failed after {} attempt(s): {}", what, attempt, e);
                    return Err(e);
                }
            }
        }
    }

    /// `run` with the default predicate: retry only transient failures.
    pub fn run_transient<T, F>(&self, what: &str, op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Result<T, RemoteError>,
    {
        self.run(what, RemoteError::is_transient, op)
    }
}
