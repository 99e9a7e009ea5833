//! Resilience configuration with builder pattern
//!
//! Provides a unified configuration for retry policies, rate limiting,
//! concurrency and request timeouts with sane defaults.

use super::retry::RetryConfig;
use std::time::Duration;

/// Highest concurrency the dashboard API tolerates per organization
pub const MAX_CONCURRENCY: usize = 10;

/// Global resilience configuration for API calls
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    pub concurrency: ConcurrencyConfig,
    /// Timeout for every single HTTP attempt
    pub request_timeout: Duration,
}

/// Concurrency limiting configuration
#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    /// Maximum records processed in parallel
    pub max_concurrent_requests: usize,
    /// Whether concurrency limiting is enabled
    pub enabled: bool,
}

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_capacity: u32,
    pub enabled: bool,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10, // Dashboard API allows 10/s per org
            burst_capacity: 10,
            enabled: true,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 1, // Sequential unless asked otherwise
            enabled: true,
        }
    }
}

impl ResilienceConfig {
    /// Create a new builder for ResilienceConfig
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// Number of records the engine may keep in flight
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency.enabled {
            self.concurrency.max_concurrent_requests.clamp(1, MAX_CONCURRENCY)
        } else {
            1
        }
    }
}

/// Builder for ResilienceConfig
#[derive(Debug)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
        }
    }

    /// Configure retry behavior
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set max attempts per call (1 disables retries)
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts.max(1);
        self
    }

    /// Set requests per second limit
    pub fn requests_per_second(mut self, rps: u32) -> Self {
        self.config.rate_limit.requests_per_second = rps.max(1);
        self
    }

    /// Set the token bucket size
    pub fn burst_capacity(mut self, burst: u32) -> Self {
        self.config.rate_limit.burst_capacity = burst.max(1);
        self
    }

    /// Enable/disable rate limiting
    pub fn enable_rate_limiting(mut self, enabled: bool) -> Self {
        self.config.rate_limit.enabled = enabled;
        self
    }

    /// Set max records in flight
    pub fn max_concurrent_requests(mut self, max: usize) -> Self {
        self.config.concurrency.max_concurrent_requests = max;
        self
    }

    /// Set the per-attempt timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}

impl Default for ResilienceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
