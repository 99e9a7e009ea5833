pub mod handler;

use clap::{ArgGroup, Args};
use std::path::PathBuf;

use crate::sync::fields::ResourceKind;
use crate::sync::report::ReportFormat;

pub use handler::handle_apply_command;

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["csv", "json"])))]
pub struct ApplyCommands {
    /// Resource kind the rows describe
    #[arg(value_enum)]
    pub kind: ResourceKind,

    /// Read records from a CSV file
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Read records from a JSON file
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Send the changes (default is a dry-run preview)
    #[arg(long)]
    pub apply: bool,

    /// Skip records whose payload is empty after projection
    #[arg(long)]
    pub skip_empty: bool,

    /// Column holding the device serial (or network id for ospf)
    #[arg(long, value_name = "COL")]
    pub id_column: Option<String>,

    /// Column holding the port, interface or route id
    #[arg(long, value_name = "COL")]
    pub sub_id_column: Option<String>,

    /// Apply every row to this device serial (or network id); it is looked up first
    #[arg(long, value_name = "ID")]
    pub target: Option<String>,

    /// Claim the --target device into this network before applying (with --apply)
    #[arg(long, value_name = "NETWORK_ID", requires = "target")]
    pub claim_network_id: Option<String>,

    /// Only write these fields (comma separated; default is every supported field)
    #[arg(long, value_name = "FIELD", value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Rename an input column to an API field name
    #[arg(long = "map", value_name = "SRC=DST")]
    pub map: Vec<String>,

    /// Treat identifiers as device names and look up their serials
    #[arg(long, requires = "org", requires = "network")]
    pub resolve_names: bool,

    /// Organization name or id used by --resolve-names
    #[arg(long, value_name = "NAME|ID", requires = "resolve_names")]
    pub org: Option<String>,

    /// Network name or id used by --resolve-names
    #[arg(long, value_name = "NAME|ID", requires = "resolve_names")]
    pub network: Option<String>,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
