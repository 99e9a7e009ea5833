pub mod handler;

use clap::Args;
use std::path::PathBuf;

pub use handler::handle_sfp_command;

#[derive(Args, Debug)]
pub struct SfpCommands {
    /// Organization name or id
    #[arg(long, value_name = "NAME|ID")]
    pub org: String,

    /// Save the inventory as CSV
    #[arg(long)]
    pub csv: bool,

    /// Save the per-switch inventory as JSON
    #[arg(long)]
    pub json: bool,

    /// Directory for the saved files
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
