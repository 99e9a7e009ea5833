mod api;
mod cli;
mod config;
mod export;
mod ingest;
mod sync;

use anyhow::Result;
use clap::Parser;
use colored::*;
use log::{debug, warn};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use cli::commands::{apply, pull, sfp};
use cli::{Cli, Commands};
use config::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env loaded: {}", e);
    }

    let settings = Settings::load(cli.config.as_deref(), cli.overrides())?;
    debug!("Resolved settings: base_url={} verify_tls={}", settings.base_url, settings.verify_tls);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight requests and skipping the rest");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Apply(args) => apply::handle_apply_command(args, &settings, cancel).await,
        Commands::Pull(args) => pull::handle_pull_command(args, &settings, cancel).await,
        Commands::Sfp(args) => sfp::handle_sfp_command(args, &settings, cancel).await,
    }
}
