//! Summary reporter
//!
//! Renders a [`RunSummary`] as human-readable lines, CSV or JSON. Counts are
//! always read from the summary, never recomputed here.

use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;

use super::engine::RunMode;
use super::fields::ResourceKind;
use super::outcome::{ApplyOutcome, RunItem, RunSummary};

/// Export format for `--format`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Csv,
    Json,
}

/// One line describing a completed record
pub fn progress_line(item: &RunItem, color: bool) -> String {
    let id = item.record.target_id();
    let row = item.record.source_row();

    match &item.outcome {
        ApplyOutcome::Planned => {
            let tag = paint("DRY-RUN", color, |s| s.yellow().bold());
            format!("{} would update {} (row {}): {}", tag, id, row, item.payload)
        }
        ApplyOutcome::Succeeded { status } => {
            let tag = paint("✓ Updated", color, |s| s.green());
            format!("{} {} (row {}) HTTP {}", tag, id, row, status)
        }
        ApplyOutcome::Failed { reason, .. } => {
            let tag = paint("✗ Failed", color, |s| s.red().bold());
            format!("{} {} (row {}): {}", tag, id, row, reason)
        }
        ApplyOutcome::Skipped { reason } => {
            let tag = paint("⊘ Skipped", color, |s| s.dimmed());
            format!("{} {} (row {}) ({})", tag, id, row, reason)
        }
    }
}

/// Header shown before a run starts or at the top of a saved report
pub fn header_lines(
    mode: RunMode,
    kind: ResourceKind,
    total: usize,
    insecure_tls: bool,
    color: bool,
) -> Vec<String> {
    let verb = match mode {
        RunMode::DryRun => "Previewing",
        RunMode::Apply => "Applying",
    };
    let mut lines = vec![format!("{} {} record(s) of kind {}", verb, total, kind)];
    if insecure_tls {
        lines.push(paint(
            "WARNING: TLS certificate verification is disabled for this run",
            color,
            |s| s.red().bold(),
        ));
    }
    lines
}

/// Rejected rows followed by the final `Done.` line
pub fn footer_lines(summary: &RunSummary, color: bool) -> Vec<String> {
    let mut lines = Vec::new();

    if !summary.rejected().is_empty() {
        lines.push(paint(
            &format!("Rejected {} input row(s):", summary.rejected().len()),
            color,
            |s| s.yellow(),
        ));
        for rejected in summary.rejected() {
            lines.push(format!("  row {}: {}", rejected.source_row, rejected.reason));
        }
    }

    lines.push(done_line(summary));
    lines
}

/// `Done. Succeeded=<n> Failed=<m> Skipped=<k>`, with `Planned=<p>` first in dry-run
pub fn done_line(summary: &RunSummary) -> String {
    match summary.mode() {
        RunMode::DryRun => format!(
            "Done. Planned={} Succeeded={} Failed={} Skipped={}",
            summary.planned(),
            summary.succeeded(),
            summary.failed(),
            summary.skipped()
        ),
        RunMode::Apply => format!(
            "Done. Succeeded={} Failed={} Skipped={}",
            summary.succeeded(),
            summary.failed(),
            summary.skipped()
        ),
    }
}

/// Full text rendering: header, one line per item, then the footer
pub fn render_text(summary: &RunSummary, color: bool) -> String {
    let mut lines = header_lines(
        summary.mode(),
        summary.kind(),
        summary.total(),
        summary.insecure_tls(),
        color,
    );
    lines.extend(summary.items().iter().map(|item| progress_line(item, color)));
    lines.extend(footer_lines(summary, color));
    lines.join("\n") + "\n"
}

#[derive(Serialize)]
struct CsvRow<'a> {
    row: usize,
    target: &'a str,
    outcome: &'static str,
    status: Option<u16>,
    reason: Option<String>,
    payload: String,
}

/// `row,target,outcome,status,reason,payload`, one line per item
pub fn render_csv(summary: &RunSummary) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for item in summary.items() {
        writer
            .serialize(CsvRow {
                row: item.record.source_row(),
                target: item.record.target_id(),
                outcome: item.outcome.label(),
                status: item.outcome.status(),
                reason: item.outcome.reason(),
                payload: item.payload.to_json().to_string(),
            })
            .context("Failed to write CSV report row")?;
    }
    // Header only comes from serialize(); emit it for empty runs too
    if summary.items().is_empty() {
        writer.write_record(["row", "target", "outcome", "status", "reason", "payload"])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV report: {}", e))?;
    String::from_utf8(bytes).context("CSV report is not valid UTF-8")
}

pub fn render_json(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("Failed to format JSON report")
}

/// Render in the requested format
pub fn render(summary: &RunSummary, format: ReportFormat, color: bool) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(summary, color)),
        ReportFormat::Csv => render_csv(summary),
        ReportFormat::Json => render_json(summary),
    }
}

fn paint(text: &str, color: bool, style: impl Fn(&str) -> ColoredString) -> String {
    if color {
        style(text).to_string()
    } else {
        text.to_string()
    }
}
