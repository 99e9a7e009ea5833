pub mod handler;

use clap::{ArgGroup, Args};
use std::path::PathBuf;

pub use handler::handle_pull_command;

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("network")
        .required(true)
        .args(["network_id", "network_url", "network_name"])
))]
pub struct PullCommands {
    /// Network id (starts with N_)
    #[arg(long, value_name = "ID")]
    pub network_id: Option<String>,

    /// Dashboard URL of the network; the id is read from its path
    #[arg(long, value_name = "URL")]
    pub network_url: Option<String>,

    /// Network name, looked up in --org-id
    #[arg(long, value_name = "NAME", requires = "org_id")]
    pub network_name: Option<String>,

    /// Organization id used with --network-name
    #[arg(long, value_name = "ID")]
    pub org_id: Option<String>,

    /// Also write one CSV with the ports of every switch
    #[arg(long)]
    pub combined: bool,

    /// Also export layer 3 interfaces and static routes
    #[arg(long)]
    pub l3: bool,

    /// Also export the network's OSPF settings as JSON
    #[arg(long)]
    pub ospf: bool,

    /// Directory for the exported files
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
