//! Pull command handler

use anyhow::{Context, Result};
use colored::*;
use is_terminal::IsTerminal;
use tokio_util::sync::CancellationToken;

use super::PullCommands;
use crate::api::discovery::{Discovery, network_id_from_url};
use crate::cli::commands::{connect, discovery};
use crate::config::Settings;
use crate::export::{PullOptions, Puller};

/// Run `pull`. Returns false when some reads failed but others were written.
pub async fn handle_pull_command(
    args: PullCommands,
    settings: &Settings,
    cancel: CancellationToken,
) -> Result<bool> {
    if args.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let transport = connect(settings)?;
    let discovery = discovery(&transport, &cancel);
    let network_id = select_network(&args, &discovery).await?;

    println!("Pulling switch configuration for network {}", network_id.cyan());

    let options = PullOptions {
        out_dir: args.out_dir,
        combined: args.combined,
        l3: args.l3,
        ospf: args.ospf,
    };
    let report = Puller::new(&discovery, &options).pull(&network_id).await?;

    for file in &report.files {
        println!("{} {}", "✓".green(), file.display());
    }
    for failure in &report.failures {
        println!("{} {}", "!".yellow(), failure);
    }

    println!(
        "Done ({}): {} switch(es), {} file(s) written, {} failure(s)",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        report.switches,
        report.files.len(),
        report.failures.len()
    );

    Ok(report.failures.is_empty())
}

async fn select_network(args: &PullCommands, discovery: &Discovery) -> Result<String> {
    if let Some(id) = &args.network_id {
        let id = id.trim();
        if !id.starts_with("N_") {
            anyhow::bail!(
                "Network id '{}' does not look like a canonical id (N_...); use --network-url or --network-name",
                id
            );
        }
        return Ok(id.to_string());
    }

    if let Some(url) = &args.network_url {
        return Ok(network_id_from_url(url)?);
    }

    match (&args.network_name, &args.org_id) {
        (Some(name), Some(org_id)) => {
            let network = discovery
                .resolve_network(org_id, name)
                .await
                .context("Failed to resolve network name")?;
            Ok(network.id)
        }
        _ => anyhow::bail!("Provide --network-id, --network-url, or --network-name with --org-id"),
    }
}
