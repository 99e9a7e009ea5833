//! Retry policy with exponential backoff and Retry-After support

use rand::Rng;
use std::time::Duration;

/// Jitter added on top of a computed backoff, as a fraction of it
const JITTER_FRACTION: f64 = 0.1;

/// Retry configuration for transient API failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per logical call, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single wait, Retry-After included
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// How a response status should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// 429 or 5xx, worth retrying
    Transient,
    /// Any other status, retrying will not help
    Permanent,
}

/// Classify an HTTP status code
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        429 | 500..=599 => StatusClass::Transient,
        _ => StatusClass::Permanent,
    }
}

/// Parse a `Retry-After` header given in (possibly fractional) seconds
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        // Values past what a Duration holds saturate; the policy caps them anyway
        Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
    } else {
        None
    }
}

/// Computes waits between attempts of one logical call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Whether another attempt is allowed after `attempts_made` attempts
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts()
    }

    /// Wait before retry number `retry` (1 for the first retry).
    ///
    /// A server-supplied `Retry-After` wins over the computed backoff; either
    /// way the result never exceeds `max_delay`.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let delay = match retry_after {
            Some(hint) => hint,
            None => self.backoff(retry),
        };
        delay.min(self.config.max_delay)
    }

    fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(32) as i32;
        let mut secs =
            self.config.base_delay.as_secs_f64() * self.config.backoff_multiplier.powi(exponent);

        if self.config.jitter && secs > 0.0 {
            let factor: f64 = rand::rng().random_range(0.0..JITTER_FRACTION);
            secs += secs * factor;
        }

        let cap = self.config.max_delay.as_secs_f64();
        Duration::from_secs_f64(secs.min(cap))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
