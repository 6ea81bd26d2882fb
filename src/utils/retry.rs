// src/utils/retry.rs
use std::time::Duration;

/// Bounded retry with linearly growing pauses (`base_delay * attempt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay }
    }

    /// Pause after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Attempt bookkeeping for one retried operation.
///
/// Callers own the loop so the operation can borrow whatever it needs
/// mutably; this only answers "how long until the next try, if any".
///
/// ```ignore
/// let mut backoff = Backoff::new(policy);
/// let result = loop {
///     match op().await {
///         Ok(v) => break Ok(v),
///         Err(e) => match backoff.next_delay() {
///             Some(pause) => tokio::time::sleep(pause).await,
///             None => break Err(e),
///         },
///     }
/// };
/// ```
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, failures: 0 }
    }

    /// 1-based number of the attempt about to run (or just run).
    pub fn attempt(&self) -> u32 {
        self.failures + 1
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Records a failure. Returns the pause before the next attempt, or
    /// `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= self.policy.max_attempts.max(1) {
            None
        } else {
            Some(self.policy.delay_after(self.failures))
        }
    }
}
