//! Concurrency limiter implementation
//!
//! Provides a semaphore-based limiter bounding how many records are in
//! flight against the dashboard API at once.

use super::config::{ConcurrencyConfig, MAX_CONCURRENCY};
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Semaphore-based concurrency limiter
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    permits: usize,
    requests_acquired: Arc<AtomicU64>,
    requests_waited: Arc<AtomicU64>,
}

impl ConcurrencyLimiter {
    /// Create a new concurrency limiter with the given configuration
    pub fn new(config: &ConcurrencyConfig) -> Self {
        let permits = if config.enabled {
            config.max_concurrent_requests.clamp(1, MAX_CONCURRENCY)
        } else {
            1
        };

        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            permits,
            requests_acquired: Arc::new(AtomicU64::new(0)),
            requests_waited: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Acquire a permit, waiting if at capacity.
    /// The permit releases automatically when dropped.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        if self.semaphore.available_permits() == 0 {
            self.requests_waited.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Concurrency limiter: waiting for permit ({} in use)",
                self.permits
            );
        }

        let permit = self.semaphore.clone().acquire_owned().await.unwrap();
        self.requests_acquired.fetch_add(1, Ordering::Relaxed);

        debug!(
            "Concurrency limiter: acquired permit ({}/{} in use)",
            self.permits - self.semaphore.available_permits(),
            self.permits
        );

        permit
    }

    /// Number of permits, i.e. the effective parallelism
    pub fn permits(&self) -> usize {
        self.permits
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get current statistics
    pub fn stats(&self) -> ConcurrencyStats {
        ConcurrencyStats {
            available_permits: self.available_permits(),
            permits: self.permits,
            requests_acquired: self.requests_acquired.load(Ordering::Relaxed),
            requests_waited: self.requests_waited.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for the concurrency limiter
#[derive(Debug, Clone)]
pub struct ConcurrencyStats {
    /// Number of permits currently available
    pub available_permits: usize,
    /// Total permits
    pub permits: usize,
    /// Total permits acquired since creation
    pub requests_acquired: u64,
    /// Number of times a caller had to wait for a permit
    pub requests_waited: u64,
}

impl ConcurrencyStats {
    /// Fraction of acquisitions that had to wait
    pub fn wait_rate(&self) -> f64 {
        if self.requests_acquired == 0 {
            0.0
        } else {
            self.requests_waited as f64 / self.requests_acquired as f64
        }
    }
}
