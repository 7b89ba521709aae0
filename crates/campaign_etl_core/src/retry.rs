//! Retry policy for connection establishment.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Flat,
    /// Delay doubles before each subsequent retry.
    Exponential,
}

/// Bounded retry with an explicit delay strategy. The default reproduces the
/// connection behavior of the deployed handler: five attempts, five seconds
/// apart, no growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn flat(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            backoff: Backoff::Flat,
        }
    }

    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff: Backoff::Exponential,
        }
    }

    /// Delay to apply before retry number `attempt` (1-based: the delay
    /// between the first failure and the second attempt is `delay_before(1)`).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Flat => self.initial_delay,
            Backoff::Exponential => {
                let exponent = attempt.saturating_sub(1).min(16);
                self.initial_delay.saturating_mul(1u32 << exponent)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::flat(5, Duration::from_secs(5))
    }
}
