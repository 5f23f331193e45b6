//! Deadline-bounded polling with a fixed tick.
//!
//! Both broker loops share the same shape:
//! - the first attempt happens immediately on entry
//! - later attempts happen on a fixed grid of `interval` ticks from entry
//! - ticks missed because an attempt ran long are skipped, never made up
//! - the deadline is fixed on entry; no tick at or past it is taken
//! - an attempt still running at the deadline is abandoned

use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::{NsmError, Result};
use std::future::Future;
use std::time::{Duration, Instant};

/// Timeout and tick interval for one wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total time budget, measured from loop entry.
    pub timeout: Duration,
    /// Fixed spacing between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: ClientConfig::CONNECTION_TIMEOUT,
            interval: ClientConfig::CONNECTION_RETRY_INTERVAL,
        }
    }
}

impl RetryPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Set the total time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the tick interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(NsmError::Validation {
                field: "timeout".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.interval.is_zero() {
            return Err(NsmError::Validation {
                field: "interval".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// State of one wait loop invocation.
///
/// Holds the absolute deadline, the next scheduled tick and the last error
/// seen. Dropped when the loop terminates.
#[derive(Debug)]
pub struct RetryContext<'a, C: Clock + ?Sized, E> {
    clock: &'a C,
    started: Instant,
    deadline: Instant,
    interval: Duration,
    next_tick: Instant,
    attempts: u32,
    last_error: Option<E>,
}

impl<'a, C: Clock + ?Sized, E> RetryContext<'a, C, E> {
    /// Start a loop now. Fails if the policy has a zero timeout or interval.
    pub fn start(clock: &'a C, policy: &RetryPolicy) -> Result<Self> {
        policy.validate()?;
        let started = clock.now();
        Ok(Self {
            clock,
            started,
            deadline: started + policy.timeout,
            interval: policy.interval,
            next_tick: started,
            attempts: 0,
            last_error: None,
        })
    }

    /// Wait for the next attempt slot.
    ///
    /// Returns `true` when an attempt should be made, or `false` once the
    /// deadline has been reached; in that case the clock has been waited up
    /// to the deadline.
    pub async fn next_attempt(&mut self) -> bool {
        let now = self.clock.now();
        while self.next_tick < now {
            self.next_tick += self.interval;
        }

        if self.next_tick >= self.deadline {
            self.clock.sleep_until(self.deadline).await;
            return false;
        }

        self.clock.sleep_until(self.next_tick).await;
        self.next_tick += self.interval;
        self.attempts += 1;
        true
    }

    /// Run one attempt, giving up on it when the deadline passes.
    ///
    /// Returns `None` if the deadline won; `attempt` has been dropped by then.
    /// An attempt that completes in the same instant still counts.
    pub async fn bounded<F: Future>(&self, attempt: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            output = attempt => Some(output),
            _ = self.clock.reached(self.deadline) => None,
        }
    }

    /// Remember the outcome of a failed attempt.
    pub fn record_error(&mut self, err: E) {
        self.last_error = Some(err);
    }

    pub fn last_error(&self) -> Option<&E> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<E> {
        self.last_error.take()
    }

    /// Number of attempt slots handed out so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started)
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}
