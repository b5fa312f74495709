use clap::{Parser, Subcommand};
use clap_complete::Shell;
use reconcile::{ResourceKey, ResourceKind};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stmtctl")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Run declarative one-shot SQL statements exactly once", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding stored objects
    #[arg(long, global = true, env = "STMTCTL_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store objects from TOML files or directories of TOML files
    Apply(ApplyArgs),

    /// Run one reconciliation pass
    Reconcile(ReconcileArgs),

    /// Reconcile continuously, polling on an interval
    Run(RunArgs),

    /// Show resources and their recorded outcomes
    Status(StatusArgs),

    /// Delete a resource or a ProviderConfig
    Delete(DeleteArgs),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Files or directories to apply
    #[arg(short, long = "file", required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,
}

#[derive(Parser)]
pub struct ReconcileArgs {
    /// Only reconcile one kind: query, execute or exec
    #[arg(short, long)]
    pub kind: Option<ResourceKind>,

    /// Resources of one kind reconciled at once
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Deadline for each resource's pass, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Parser)]
pub struct RunArgs {
    /// Seconds between passes
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Stop after this many passes
    #[arg(long)]
    pub max_passes: Option<usize>,

    /// Resources of one kind reconciled at once
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Deadline for each resource's pass, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Parser)]
pub struct StatusArgs {
    /// A single resource (e.g. query/count-logins) or a kind (e.g. exec)
    pub target: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct DeleteArgs {
    /// Resource to delete, as <kind>/<name>, or providerconfig/<name>
    pub target: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show settings and directory locations
    Show,
}

/// What `stmtctl delete` acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Resource(ResourceKey),
    ProviderConfig(String),
}

impl std::str::FromStr for DeleteTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some(("providerconfig" | "ProviderConfig", name)) if !name.is_empty() => {
                Ok(Self::ProviderConfig(name.to_string()))
            }
            _ => s.parse().map(Self::Resource),
        }
    }
}
