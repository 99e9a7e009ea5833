//! Process-wide rate limiter
//!
//! A token bucket caps the steady request rate, and a shared cooldown lets a
//! single 429 pause every caller holding a clone of the limiter.

use super::config::RateLimitConfig;
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    cooldown_until: Option<Instant>,
}

/// Token bucket plus global cooldown, cheap to clone and share between workers
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<Mutex<BucketState>>,
    requests_acquired: Arc<AtomicU64>,
    requests_throttled: Arc<AtomicU64>,
    cooldowns: Arc<AtomicU64>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let burst = config.burst_capacity.max(1) as f64;
        Self {
            config,
            state: Arc::new(Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
                cooldown_until: None,
            })),
            requests_acquired: Arc::new(AtomicU64::new(0)),
            requests_throttled: Arc::new(AtomicU64::new(0)),
            cooldowns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wait until a request may be sent.
    ///
    /// A pending cooldown is honored even when rate limiting is disabled, so
    /// server throttling is always respected.
    pub async fn acquire(&self) {
        let mut waited = false;
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                match state.cooldown_until {
                    Some(until) if until > now => Some(until - now),
                    _ => {
                        state.cooldown_until = None;
                        if self.config.enabled {
                            self.take_token(&mut state, now)
                        } else {
                            None
                        }
                    }
                }
            };

            match wait {
                Some(wait) => {
                    waited = true;
                    debug!("Rate limiter: waiting {:?} before next request", wait);
                    tokio::time::sleep(wait).await;
                }
                None => break,
            }
        }

        self.requests_acquired.fetch_add(1, Ordering::Relaxed);
        if waited {
            self.requests_throttled.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Take a token, or return how long until one is available
    fn take_token(&self, state: &mut BucketState, now: Instant) -> Option<Duration> {
        let rate = self.config.requests_per_second.max(1) as f64;
        let burst = self.config.burst_capacity.max(1) as f64;

        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * rate).min(burst);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            None
        } else {
            Some(Duration::from_secs_f64((1.0 - state.tokens) / rate))
        }
    }

    /// Pause all callers for at least `wait` from now
    pub async fn defer(&self, wait: Duration) {
        let mut state = self.state.lock().await;
        let until = Instant::now() + wait;
        if state.cooldown_until.is_none_or(|current| current < until) {
            state.cooldown_until = Some(until);
            self.cooldowns.fetch_add(1, Ordering::Relaxed);
            debug!("Rate limiter: global cooldown extended by {:?}", wait);
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            requests_acquired: self.requests_acquired.load(Ordering::Relaxed),
            requests_throttled: self.requests_throttled.load(Ordering::Relaxed),
            cooldowns: self.cooldowns.load(Ordering::Relaxed),
            requests_per_second: self.config.requests_per_second,
            enabled: self.config.enabled,
        }
    }
}

/// Statistics for the rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiterStats {
    /// Requests let through since creation
    pub requests_acquired: u64,
    /// Requests that had to wait at least once
    pub requests_throttled: u64,
    /// Times a 429 pushed the global cooldown forward
    pub cooldowns: u64,
    pub requests_per_second: u32,
    pub enabled: bool,
}
