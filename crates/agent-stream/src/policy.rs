use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded exponential backoff for stream connection establishment.
///
/// Retry `n` (zero-based) waits `min(base_delay_ms * multiplier^n, max_delay_ms)`.
/// The default allows three retries after the first attempt: 1s, 2s, 4s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries allowed after the first connection attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: u32,
    /// Ceiling for any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            multiplier: 2,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Fails on the first connection error.
    pub fn none() -> Self {
        Self::default().with_max_retries(0)
    }

    /// Custom schedule keeping the default 10s ceiling. A zero base delay or
    /// multiplier falls back to the default.
    pub fn exponential(max_retries: u32, base_delay_ms: u64, multiplier: u32) -> Self {
        let defaults = Self::default();
        Self {
            max_retries,
            base_delay_ms: if base_delay_ms == 0 {
                defaults.base_delay_ms
            } else {
                base_delay_ms
            },
            multiplier: if multiplier == 0 {
                defaults.multiplier
            } else {
                multiplier
            },
            max_delay_ms: defaults.max_delay_ms,
        }
    }

    /// Sets the retry ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the cap on a single delay.
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Delay before zero-based retry `retry_index`. Saturates instead of
    /// overflowing for large indexes.
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let growth = u64::from(self.multiplier).saturating_pow(retry_index);
        let ms = self.base_delay_ms.saturating_mul(growth).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Progress text shown while waiting for retry `retry_number` (one-based).
    pub fn retry_notice(&self, retry_number: u32, delay: Duration) -> String {
        let secs = delay.as_secs() + u64::from(delay.subsec_nanos() > 0);
        format!(
            "Connection failed, retrying in {secs}s (attempt {retry_number}/{})",
            self.max_retries
        )
    }
}

/// Retry bookkeeping for one stream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Retries scheduled so far.
    pub attempt: u32,
    pub max_attempts: u32,
}

impl RetryState {
    /// Fresh state for one stream request.
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 0,
            max_attempts: policy.max_retries,
        }
    }

    /// Schedules the next retry, returning its delay, or `None` once the
    /// ceiling is reached.
    pub fn next_delay(&mut self, policy: &RetryPolicy) -> Option<Duration> {
        if self.exhausted() {
            return None;
        }
        let delay = policy.delay_for(self.attempt);
        self.attempt += 1;
        Some(delay)
    }

    /// True once no retries are left.
    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}
