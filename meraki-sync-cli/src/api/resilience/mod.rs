//! Production resilience features
//!
//! Provides retry policies, a shared rate limiter and concurrency limiting
//! for dashboard API calls.

pub mod concurrency;
pub mod config;
pub mod rate_limiter;
pub mod retry;

pub use concurrency::ConcurrencyLimiter;
pub use config::{ConcurrencyConfig, ResilienceConfig};
pub use rate_limiter::RateLimiter;
pub use retry::{RetryConfig, RetryPolicy, StatusClass, classify_status, parse_retry_after};
