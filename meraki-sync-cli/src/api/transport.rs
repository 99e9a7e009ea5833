//! Rate-limited transport
//!
//! Wraps one logical API call with the shared rate limiter, a per-attempt
//! timeout and a bounded retry loop. HTTP 429, 5xx and network failures
//! share a single attempt budget; any other non-2xx status fails at once.

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::request::{ApiRequest, ApiResponse};
use super::resilience::{
    RateLimiter, ResilienceConfig, RetryPolicy, StatusClass, classify_status,
};

/// Failure below HTTP: no status line was received
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

/// Executes a single HTTP attempt. The reqwest client implements this;
/// tests substitute scripted executors.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(
        &self,
        request: &ApiRequest,
        timeout: Duration,
    ) -> Result<ApiResponse, NetworkError>;

    /// Whether certificate verification is switched off
    fn insecure_tls(&self) -> bool {
        false
    }
}

/// Which kind of transient failure exhausted the budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientCause {
    RateLimited,
    ServerError,
    Network,
}

impl std::fmt::Display for TransientCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientCause::RateLimited => write!(f, "rate limit exhausted"),
            TransientCause::ServerError => write!(f, "server error persisted"),
            TransientCause::Network => write!(f, "network failure persisted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Retries ran out; carries the last status and body seen
    #[error("{cause} after {attempts} attempts: {detail}")]
    Transient {
        cause: TransientCause,
        status: Option<u16>,
        detail: String,
        attempts: u32,
    },
    /// Not retryable (4xx other than 429)
    #[error("HTTP {status}: {body}")]
    Permanent { status: u16, body: String },
    /// The caller gave up while waiting to retry
    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Transient { status, .. } => *status,
            TransportError::Permanent { status, .. } => Some(*status),
            TransportError::Cancelled { .. } => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            TransportError::Transient { attempts, .. } => *attempts,
            TransportError::Permanent { .. } => 1,
            TransportError::Cancelled { attempts } => *attempts,
        }
    }
}

/// A successful response plus how many attempts it took
#[derive(Debug, Clone)]
pub struct Delivered {
    pub response: ApiResponse,
    pub attempts: u32,
}

/// Retrying, rate-limited front for an [`HttpExecutor`]
#[derive(Clone)]
pub struct RateLimitedTransport {
    executor: Arc<dyn HttpExecutor>,
    policy: RetryPolicy,
    limiter: RateLimiter,
    timeout: Duration,
}

impl RateLimitedTransport {
    pub fn new(executor: Arc<dyn HttpExecutor>, config: &ResilienceConfig) -> Self {
        Self {
            executor,
            policy: RetryPolicy::new(config.retry.clone()),
            limiter: RateLimiter::new(config.rate_limit.clone()),
            timeout: config.request_timeout,
        }
    }

    pub fn insecure_tls(&self) -> bool {
        self.executor.insecure_tls()
    }

    /// The limiter shared by every clone of this transport
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Perform one logical call, retrying transient failures
    pub async fn call(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<Delivered, TransportError> {
        let mut attempts: u32 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(TransportError::Cancelled { attempts }),
                _ = self.limiter.acquire() => {}
            }

            attempts += 1;
            debug!(
                "{} (attempt {}/{})",
                request,
                attempts,
                self.policy.max_attempts()
            );

            let (cause, status, detail, retry_after) =
                match self.executor.execute(request, self.timeout).await {
                    Ok(response) => match classify_status(response.status) {
                        StatusClass::Success => {
                            return Ok(Delivered { response, attempts });
                        }
                        StatusClass::Permanent => {
                            return Err(TransportError::Permanent {
                                status: response.status,
                                body: response.body_snippet(),
                            });
                        }
                        StatusClass::Transient => {
                            let cause = if response.status == 429 {
                                TransientCause::RateLimited
                            } else {
                                TransientCause::ServerError
                            };
                            let detail = format!(
                                "HTTP {} {}",
                                response.status,
                                response.body_snippet()
                            );
                            (cause, Some(response.status), detail, response.retry_after())
                        }
                    },
                    Err(err) => (TransientCause::Network, None, err.to_string(), None),
                };

            if !self.policy.should_retry(attempts) {
                warn!("{}: {} after {} attempts", request, cause, attempts);
                return Err(TransportError::Transient {
                    cause,
                    status,
                    detail: detail.trim_end().to_string(),
                    attempts,
                });
            }

            let delay = self.policy.delay_for(attempts, retry_after);
            if cause == TransientCause::RateLimited {
                self.limiter.defer(delay).await;
            }
            warn!(
                "{}: {} (attempt {}), retrying in {:.1}s",
                request,
                detail.trim_end(),
                attempts,
                delay.as_secs_f64()
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(TransportError::Cancelled { attempts }),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
