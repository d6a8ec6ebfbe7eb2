//! Reconnect Backoff
//!
//! Delay before reconnect attempt `n` (zero-based) is `base * 2^n`. After
//! `max_attempts` delays the schedule is exhausted and the session gives up.

use std::time::Duration;

/// Default number of reconnect attempts per session.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default base delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Exponential reconnect schedule.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    /// Create a schedule.
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts,
            attempt: 0,
        }
    }

    /// Delay before the next attempt, advancing the counter.
    /// Returns `None` once `max_attempts` delays have been handed out.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let delay = Self::delay_for(self.base, self.attempt);
        self.attempt += 1;
        Some(delay)
    }

    /// Delay for a given zero-based attempt, saturating instead of overflowing.
    pub fn delay_for(base: Duration, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        base.checked_mul(factor).unwrap_or(Duration::MAX)
    }

    /// Longest delay this schedule will produce.
    pub fn max_delay(&self) -> Duration {
        if self.max_attempts == 0 {
            return Duration::ZERO;
        }
        Self::delay_for(self.base, self.max_attempts - 1)
    }

    /// Attempts handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether no attempts remain.
    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Start over after a successful open.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS)
    }
}
