//! Command line interface

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;
use commands::apply::ApplyCommands;
use commands::pull::PullCommands;
use commands::sfp::SfpCommands;

#[derive(Parser, Debug)]
#[command(name = "meraki-sync")]
#[command(version)]
#[command(about = "Sync switch, device and routing configuration between CSV/JSON files and the Meraki dashboard", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (default: <config dir>/meraki-sync/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Dashboard API key (overrides MERAKI_API_KEY / meraki_api_key)
    #[arg(long, value_name = "KEY", global = true)]
    pub api_key: Option<String>,

    /// API base URL
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Disable TLS certificate verification (not recommended)
    #[arg(long, global = true)]
    pub no_verify: bool,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Retries after the first attempt for 429, 5xx and network errors
    #[arg(long, value_name = "N", global = true)]
    pub max_retries: Option<u32>,

    /// Records processed in parallel (1 = sequential, max 10)
    #[arg(long, value_name = "N", global = true)]
    pub concurrency: Option<usize>,

    /// Requests per second shared by all workers
    #[arg(long, value_name = "RPS", global = true)]
    pub rate_limit: Option<u32>,

    /// Overall deadline in seconds; unfinished records are skipped
    #[arg(long, value_name = "SECS", global = true)]
    pub deadline: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply (or preview) records from a CSV or JSON file
    Apply(ApplyCommands),

    /// Export a network's switch configuration to CSV/JSON files
    Pull(PullCommands),

    /// Inventory populated SFP ports across an organization's switches
    Sfp(SfpCommands),
}

impl Cli {
    /// Flags that override file and environment configuration
    pub fn overrides(&self) -> Overrides {
        let skip_empty = match &self.command {
            Commands::Apply(args) => args.skip_empty,
            Commands::Pull(_) | Commands::Sfp(_) => false,
        };
        Overrides {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            no_verify: self.no_verify,
            timeout_secs: self.timeout,
            max_retries: self.max_retries,
            concurrency: self.concurrency,
            rate_limit: self.rate_limit,
            deadline_secs: self.deadline,
            skip_empty,
        }
    }
}
