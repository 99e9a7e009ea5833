//! Apply engine
//!
//! Drives every record through projection and, in apply mode, a single
//! rate-limited PUT. Failures stay with their record; the run always
//! produces a complete [`RunSummary`].

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::api::request::ApiRequest;
use crate::api::resilience::{ConcurrencyConfig, ConcurrencyLimiter};
use crate::api::transport::{RateLimitedTransport, TransportError};

use super::fields::{ResourceKind, SupportedFieldSet};
use super::outcome::{ApplyOutcome, RunItem, RunSummary, SkipReason, SummaryBuilder};
use super::projector::project;
use super::record::{Record, Rejected};

/// Whether the run writes to the API or only previews
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    DryRun,
    Apply,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::DryRun => write!(f, "dry-run"),
            RunMode::Apply => write!(f, "apply"),
        }
    }
}

/// Everything the engine needs to know about a run, fixed at construction
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: RunMode,
    pub kind: ResourceKind,
    pub field_set: SupportedFieldSet,
    /// Skip records whose projected payload is empty instead of sending `{}`
    pub skip_empty: bool,
    pub concurrency: ConcurrencyConfig,
    /// Wall-clock limit for the whole run
    pub deadline: Option<Duration>,
}

impl EngineConfig {
    /// Sequential run using the kind's full field set
    pub fn new(kind: ResourceKind, mode: RunMode) -> Self {
        Self {
            mode,
            kind,
            field_set: kind.field_set(),
            skip_empty: false,
            concurrency: ConcurrencyConfig::default(),
            deadline: None,
        }
    }

    pub fn with_field_set(mut self, field_set: SupportedFieldSet) -> Self {
        self.field_set = field_set;
        self
    }

    pub fn with_skip_empty(mut self, skip_empty: bool) -> Self {
        self.skip_empty = skip_empty;
        self
    }

    pub fn with_concurrency(mut self, max_in_flight: usize) -> Self {
        self.concurrency = ConcurrencyConfig {
            max_concurrent_requests: max_in_flight,
            enabled: true,
        };
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }
}

pub struct ApplyEngine {
    transport: RateLimitedTransport,
    config: EngineConfig,
    limiter: ConcurrencyLimiter,
    cancel: CancellationToken,
}

impl ApplyEngine {
    pub fn new(transport: RateLimitedTransport, config: EngineConfig) -> Self {
        let limiter = ConcurrencyLimiter::new(&config.concurrency);
        Self {
            transport,
            config,
            limiter,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token (Ctrl-C handler) for cancellation
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process all records, calling `on_item` as each one completes.
    ///
    /// Rejected entries are counted apart from `total`. Records still
    /// pending when the run is cancelled become `Skipped { cancelled }`.
    pub async fn run_with_progress<I, F>(&self, input: I, on_item: F) -> RunSummary
    where
        I: IntoIterator<Item = Result<Record, Rejected>>,
        F: Fn(&RunItem) + Send + Sync,
    {
        let mut builder = SummaryBuilder::new(
            self.config.mode,
            self.config.kind,
            self.transport.insecure_tls(),
        );

        let mut records = Vec::new();
        for entry in input {
            match entry {
                Ok(record) => records.push(record),
                Err(rejected) => {
                    warn!("Rejected input {}", rejected);
                    builder.reject(&rejected);
                }
            }
        }

        info!(
            "Starting {} of {} {} record(s) with {} worker(s)",
            self.config.mode,
            records.len(),
            self.config.kind,
            self.limiter.permits()
        );

        let cancel = self.cancel.child_token();
        let deadline = self.config.deadline.map(|limit| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                warn!("Run deadline of {:?} reached, cancelling remaining records", limit);
                token.cancel();
            })
        });

        // The semaphore bounds in-flight records; it is FIFO so records start in input order
        let builder = Mutex::new(builder);
        let shared = (&cancel, &builder, &on_item);
        stream::iter(records.into_iter().enumerate())
            .for_each_concurrent(None, move |(index, record)| {
                let (cancel, builder, on_item) = shared;
                async move {
                    let _permit = self.limiter.acquire().await;
                    let item = self.process(record, cancel).await;
                    on_item(&item);
                    match builder.lock() {
                        Ok(mut guard) => guard.push(index, item),
                        Err(poisoned) => poisoned.into_inner().push(index, item),
                    }
                }
            })
            .await;

        if let Some(handle) = deadline {
            handle.abort();
        }

        let requests = self.transport.limiter().stats();
        let workers = self.limiter.stats();
        let pace = if requests.enabled {
            format!("{}/s", requests.requests_per_second)
        } else {
            "off".to_string()
        };
        debug!(
            "Rate limiter ({}): {} request(s), {} throttled, {} cooldown(s)",
            pace, requests.requests_acquired, requests.requests_throttled, requests.cooldowns
        );
        debug!(
            "Workers: {}/{} free at finish, {:.0}% of records waited for one",
            workers.available_permits,
            workers.permits,
            workers.wait_rate() * 100.0
        );

        let builder = match builder.into_inner() {
            Ok(builder) => builder,
            Err(poisoned) => poisoned.into_inner(),
        };
        builder.finish()
    }

    async fn process(&self, record: Record, cancel: &CancellationToken) -> RunItem {
        let payload = project(&record, &self.config.field_set);

        let skipped = |record: Record, payload, reason| RunItem {
            record,
            payload,
            outcome: ApplyOutcome::Skipped { reason },
            attempts: 0,
        };

        if cancel.is_cancelled() {
            return skipped(record, payload, SkipReason::Cancelled);
        }
        if payload.is_empty() && self.config.skip_empty {
            debug!("{}: nothing to send, skipping", record.target_id());
            return skipped(record, payload, SkipReason::EmptyPayload);
        }

        if self.config.mode == RunMode::DryRun {
            return RunItem {
                record,
                payload,
                outcome: ApplyOutcome::Planned,
                attempts: 0,
            };
        }

        let request = ApiRequest::put(self.config.kind.path(record.target_id()), payload.to_json());
        let (outcome, attempts) = match self.transport.call(&request, cancel).await {
            Ok(delivered) => (
                ApplyOutcome::Succeeded {
                    status: delivered.response.status,
                },
                delivered.attempts,
            ),
            Err(TransportError::Cancelled { attempts }) => (
                ApplyOutcome::Skipped {
                    reason: SkipReason::Cancelled,
                },
                attempts,
            ),
            Err(err) => (
                ApplyOutcome::Failed {
                    reason: err.to_string(),
                    status: err.status(),
                },
                err.attempts(),
            ),
        };

        RunItem {
            record,
            payload,
            outcome,
            attempts,
        }
    }
}
