use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gendb_store::BackendKind;
use gendb_types::ObjectType;

#[derive(Parser)]
#[command(
    name = "gendb",
    about = "Inspect and maintain gendb genealogy databases",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage backend, overriding the configuration file
    #[arg(long, global = true)]
    pub backend: Option<BackendArg>,

    /// Database path, overriding the configuration file
    #[arg(long, global = true)]
    pub path: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendArg {
    Memory,
    Sqlite,
    Logfile,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => BackendKind::Memory,
            BackendArg::Sqlite => BackendKind::Sqlite,
            BackendArg::Logfile => BackendKind::LogFile,
        }
    }
}

fn parse_object_type(s: &str) -> Result<ObjectType, String> {
    s.parse().map_err(|e: gendb_types::TypeError| e.to_string())
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a database, or open an existing one and report its id
    Init,
    /// Show object counts and database details
    Stats,
    /// Compare the reference index with the stored objects
    Check(CheckArgs),
    /// Rebuild the reference index
    Reindex,
    /// Recompute order keys, custom-value registries and the surname list
    Rebuild,
    /// Copy every object into a new, empty database
    Copy(CopyArgs),
    /// Write objects as JSON lines
    Export(ExportArgs),
    /// Print one object by handle or id
    Get(GetArgs),
    /// List the objects that reference a handle
    Backlinks(BacklinksArgs),
    /// Show or change the id template of an object type
    Prefix(PrefixArgs),
    /// List the surnames in use
    Surnames,
    /// Rewrite a log-file database without superseded records
    Compact,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Also list each problem found
    #[arg(long)]
    pub details: bool,
}

#[derive(Args)]
pub struct CopyArgs {
    /// Backend of the new database
    #[arg(long)]
    pub to_backend: BackendArg,
    /// Path of the new database
    #[arg(long)]
    pub to_path: PathBuf,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Object types to export; all types when omitted
    #[arg(short = 't', long = "type", value_parser = parse_object_type)]
    pub types: Vec<ObjectType>,
    /// Output file; standard output when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct GetArgs {
    #[arg(value_parser = parse_object_type)]
    pub object_type: ObjectType,
    /// A handle, or a user-facing id such as I0001
    pub key: String,
}

#[derive(Args)]
pub struct BacklinksArgs {
    pub handle: String,
    /// Only report referrers of these types
    #[arg(short = 't', long = "type", value_parser = parse_object_type)]
    pub types: Vec<ObjectType>,
}

#[derive(Args)]
pub struct PrefixArgs {
    #[arg(value_parser = parse_object_type)]
    pub object_type: ObjectType,
    /// New template, such as I%04d
    pub template: Option<String>,
}
