//! SFP inventory command handler

use anyhow::{Context, Result};
use colored::*;
use is_terminal::IsTerminal;
use tokio_util::sync::CancellationToken;

use super::SfpCommands;
use crate::cli::commands::{connect, discovery};
use crate::config::Settings;
use crate::export::sfp::{SfpOptions, SfpReport, SfpScanner};

/// Run `sfp`. Returns false when some networks or switches could not be read.
pub async fn handle_sfp_command(
    args: SfpCommands,
    settings: &Settings,
    cancel: CancellationToken,
) -> Result<bool> {
    if args.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let transport = connect(settings)?;
    let discovery = discovery(&transport, &cancel);
    let org = discovery
        .resolve_organization(&args.org)
        .await
        .context("Failed to resolve organization")?;

    println!("Scanning {} ({}) for SFP modules", org.name.cyan(), org.id);

    let started = chrono::Local::now();
    let options = SfpOptions {
        out_dir: args.out_dir,
        csv: args.csv,
        json: args.json,
        stamp: started.format("%Y%m%d_%H%M%S").to_string(),
    };
    let report = SfpScanner::new(&discovery, &options).scan(&org.id).await?;

    for line in summary_lines(&report) {
        println!("{}", line);
    }
    for failure in &report.failures {
        println!("{} {}", "!".yellow(), failure);
    }
    for file in &report.files {
        println!("{} {}", "✓".green(), file.display());
    }

    let elapsed = chrono::Local::now() - started;
    println!(
        "Done ({}): {} network(s), {} switch(es) scanned in {}s, {} failure(s)",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        report.networks,
        report.switches_scanned,
        elapsed.num_seconds(),
        report.failures.len()
    );

    Ok(report.failures.is_empty())
}

fn summary_lines(report: &SfpReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .switches
        .iter()
        .map(|s| {
            format!(
                "{} {} {} ({}) in {}: {} SFP module(s)",
                "✓".green(),
                s.switch.serial,
                s.switch.name,
                s.switch.model,
                s.switch.network_name,
                s.sfp_count
            )
        })
        .collect();

    lines.push(String::new());
    lines.push(format!("{}", "=== Organization SFP Inventory ===".bold()));
    lines.push(format!("Total SFP modules: {}", report.module_count()));
    lines.push(format!(
        "Switches with SFP modules: {} of {}",
        report.switches.len(),
        report.switches_scanned
    ));

    let speeds = report.by_speed();
    if !speeds.is_empty() {
        lines.push("By speed:".to_string());
        lines.extend(speeds.iter().map(|(speed, count)| format!("  {}: {}", speed, count)));
    }
    lines
}
