//! Per-record outcomes and the run summary built from them

use serde::Serialize;

use super::engine::RunMode;
use super::fields::ResourceKind;
use super::projector::ProjectedPayload;
use super::record::{Record, Rejected};

/// Why a record was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Projection left nothing to send and empty payloads are skipped
    EmptyPayload,
    /// The run was interrupted or hit its deadline first
    Cancelled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::EmptyPayload => write!(f, "empty payload"),
            SkipReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal result for one record in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Dry-run: the payload would have been sent
    Planned,
    /// The remote API accepted the update
    Succeeded { status: u16 },
    /// The call failed permanently or ran out of retries
    Failed { reason: String, status: Option<u16> },
    /// Never attempted
    Skipped { reason: SkipReason },
}

impl ApplyOutcome {
    /// Short label used in reports ("planned", "succeeded", ...)
    pub fn label(&self) -> &'static str {
        match self {
            ApplyOutcome::Planned => "planned",
            ApplyOutcome::Succeeded { .. } => "succeeded",
            ApplyOutcome::Failed { .. } => "failed",
            ApplyOutcome::Skipped { .. } => "skipped",
        }
    }

    /// HTTP status attached to the outcome, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApplyOutcome::Succeeded { status } => Some(*status),
            ApplyOutcome::Failed { status, .. } => *status,
            _ => None,
        }
    }

    /// Failure or skip reason, if any
    pub fn reason(&self) -> Option<String> {
        match self {
            ApplyOutcome::Failed { reason, .. } => Some(reason.clone()),
            ApplyOutcome::Skipped { reason } => Some(reason.to_string()),
            _ => None,
        }
    }
}

/// A record paired with the payload computed for it and its outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunItem {
    pub record: Record,
    pub payload: ProjectedPayload,
    pub outcome: ApplyOutcome,
    /// HTTP attempts made, 0 when no call was issued
    pub attempts: u32,
}

/// Aggregate result of one engine run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    mode: RunMode,
    kind: ResourceKind,
    insecure_tls: bool,
    total: usize,
    planned: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    items: Vec<RunItem>,
    rejected: Vec<RejectedEntry>,
}

/// Serializable view of a rejected input row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedEntry {
    pub source_row: usize,
    pub reason: String,
}

impl From<&Rejected> for RejectedEntry {
    fn from(rejected: &Rejected) -> Self {
        Self {
            source_row: rejected.source_row,
            reason: rejected.error.to_string(),
        }
    }
}

impl RunSummary {
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Whether TLS verification was disabled for this run
    pub fn insecure_tls(&self) -> bool {
        self.insecure_tls
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn planned(&self) -> usize {
        self.planned
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Items in input order
    pub fn items(&self) -> &[RunItem] {
        &self.items
    }

    /// Rows refused before the run, not part of `total`
    pub fn rejected(&self) -> &[RejectedEntry] {
        &self.rejected
    }

    /// True when no record failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Accumulates outcomes as they arrive (possibly out of order)
#[derive(Debug)]
pub(crate) struct SummaryBuilder {
    mode: RunMode,
    kind: ResourceKind,
    insecure_tls: bool,
    items: Vec<(usize, RunItem)>,
    rejected: Vec<RejectedEntry>,
    planned: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
}

impl SummaryBuilder {
    pub(crate) fn new(mode: RunMode, kind: ResourceKind, insecure_tls: bool) -> Self {
        Self {
            mode,
            kind,
            insecure_tls,
            items: Vec::new(),
            rejected: Vec::new(),
            planned: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
        }
    }

    pub(crate) fn reject(&mut self, rejected: &Rejected) {
        self.rejected.push(rejected.into());
    }

    /// Record the outcome for the item at input position `index`
    pub(crate) fn push(&mut self, index: usize, item: RunItem) {
        match item.outcome {
            ApplyOutcome::Planned => self.planned += 1,
            ApplyOutcome::Succeeded { .. } => self.succeeded += 1,
            ApplyOutcome::Failed { .. } => self.failed += 1,
            ApplyOutcome::Skipped { .. } => self.skipped += 1,
        }
        self.items.push((index, item));
    }

    /// Restore input order and freeze the counts
    pub(crate) fn finish(mut self) -> RunSummary {
        self.items.sort_by_key(|(index, _)| *index);
        let items: Vec<RunItem> = self.items.into_iter().map(|(_, item)| item).collect();
        let total = items.len();

        debug_assert_eq!(
            total,
            self.planned + self.succeeded + self.failed + self.skipped,
            "outcome counts do not add up to the number of items"
        );

        RunSummary {
            mode: self.mode,
            kind: self.kind,
            insecure_tls: self.insecure_tls,
            total,
            planned: self.planned,
            succeeded: self.succeeded,
            failed: self.failed,
            skipped: self.skipped,
            items,
            rejected: self.rejected,
        }
    }
}
