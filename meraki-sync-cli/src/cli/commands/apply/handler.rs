//! Apply command handler

use anyhow::{Context, Result};
use colored::*;
use is_terminal::IsTerminal;
use log::{info, warn};
use std::fs;
use tokio_util::sync::CancellationToken;

use super::ApplyCommands;
use crate::api::discovery::DeviceDirectory;
use crate::api::transport::RateLimitedTransport;
use crate::cli::commands::{connect, discovery};
use crate::config::Settings;
use crate::ingest::{self, ColumnMap, IngestOptions};
use crate::sync::engine::{ApplyEngine, EngineConfig, RunMode};
use crate::sync::fields::{ResourceKind, SupportedFieldSet};
use crate::sync::report::{self, ReportFormat};
use crate::sync::target::{Prepared, TargetPreparer};

/// Run `apply`. Returns whether every record succeeded (or was only planned).
pub async fn handle_apply_command(
    args: ApplyCommands,
    settings: &Settings,
    cancel: CancellationToken,
) -> Result<bool> {
    if args.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
    let color = colored::control::SHOULD_COLORIZE.should_colorize();

    let mode = if args.apply {
        RunMode::Apply
    } else {
        RunMode::DryRun
    };

    let mut options = IngestOptions::new(args.kind);
    if let Some(column) = args.id_column {
        options.id_column = column;
    }
    if let Some(column) = args.sub_id_column {
        options.sub_id_column = column;
    }
    options.target = args.target.clone();
    options.column_map = ColumnMap::parse(&args.map).context("Invalid --map value")?;
    let field_set = select_fields(args.kind, &args.fields)?;

    let transport = connect(settings)?;

    let directory = match (args.resolve_names, &args.org, &args.network) {
        (true, Some(org), Some(network)) => {
            Some(resolve_directory(&transport, &cancel, org, network).await?)
        }
        _ => None,
    };

    let ingested = match (&args.csv, &args.json) {
        (Some(path), _) => ingest::load_csv(path, &options, directory.as_ref())?,
        (None, Some(path)) => ingest::load_json(path, &options, directory.as_ref())?,
        (None, None) => anyhow::bail!("Provide --csv or --json"),
    };

    // Keep stdout clean when it carries a machine-readable report
    let to_stderr = args.format != ReportFormat::Text && args.output.is_none();
    let emit = |line: &str| {
        if to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    };

    if let Some(target) = &args.target {
        let prepared = TargetPreparer::new(&transport, &cancel)
            .prepare(args.kind, target, args.claim_network_id.as_deref(), mode)
            .await?;
        emit(&target_line(&prepared));
    }

    let total = ingested.iter().filter(|entry| entry.is_ok()).count();
    for line in report::header_lines(mode, args.kind, total, transport.insecure_tls(), color) {
        emit(&line);
    }

    let config = EngineConfig::new(args.kind, mode)
        .with_field_set(field_set)
        .with_skip_empty(settings.skip_empty)
        .with_concurrency(settings.concurrency())
        .with_deadline(settings.deadline);
    let engine = ApplyEngine::new(transport, config).with_cancellation(cancel);

    let summary = engine
        .run_with_progress(ingested, |item| emit(&report::progress_line(item, color)))
        .await;

    for line in report::footer_lines(&summary, color) {
        emit(&line);
    }

    match (&args.output, args.format) {
        (Some(path), format) => {
            let rendered = report::render(&summary, format, false)?;
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report written to {}", path.display());
            emit(&format!("Report written to {}", path.display().to_string().cyan()));
        }
        (None, ReportFormat::Text) => {}
        (None, format) => print!("{}", report::render(&summary, format, false)?),
    }

    if mode == RunMode::DryRun && summary.planned() > 0 {
        emit(&format!(
            "{}",
            "Dry-run only, nothing was changed. Re-run with --apply to push these updates."
                .yellow()
        ));
    }

    Ok(summary.is_success())
}

fn target_line(prepared: &Prepared) -> String {
    match prepared {
        Prepared::Ready { target, claimed: true } => {
            format!("Claimed, target {} (the claim may take a minute to settle)", target.to_string().cyan())
        }
        Prepared::Ready { target, claimed: false } => format!("Target {}", target.to_string().cyan()),
        Prepared::ClaimPending { serial, network_id } => format!(
            "{} would be claimed into network {}; the target lookup runs with --apply",
            serial.cyan(),
            network_id
        ),
    }
}

/// The kind's field set, narrowed by `--fields` when given
fn select_fields(kind: ResourceKind, fields: &[String]) -> Result<SupportedFieldSet> {
    let supported = kind.field_set();
    if fields.is_empty() {
        return Ok(supported);
    }

    let selected = supported.restrict(fields).map_err(|unknown| {
        anyhow::anyhow!(
            "--fields: {} cannot be written for {} (supported: {})",
            unknown.join(", "),
            kind,
            supported.iter().collect::<Vec<_>>().join(", ")
        )
    })?;
    if selected.is_empty() {
        anyhow::bail!("--fields names no field");
    }
    info!("Writing {} of {} supported field(s)", selected.len(), supported.len());
    Ok(selected)
}

/// Organization, then network, then the name table of its devices
async fn resolve_directory(
    transport: &RateLimitedTransport,
    cancel: &CancellationToken,
    org: &str,
    network: &str,
) -> Result<DeviceDirectory> {
    let discovery = discovery(transport, cancel);
    let org = discovery
        .resolve_organization(org)
        .await
        .context("Failed to resolve organization")?;
    let network = discovery
        .resolve_network(&org.id, network)
        .await
        .context("Failed to resolve network")?;
    let directory = discovery
        .directory(&network.id)
        .await
        .context("Failed to list network devices")?;
    if directory.is_empty() {
        warn!("No named devices in network {}; every name will be unresolved", network.name);
    } else {
        info!("Resolving device names against {} device(s)", directory.len());
    }
    Ok(directory)
}
