use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kforge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Plan and apply Kubernetes cluster infrastructure from a declarative spec", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Cluster document to work on
    #[arg(short = 'f', long, global = true, default_value = "cluster.toml", env = "KFORGE_CLUSTER_FILE")]
    pub cluster_file: PathBuf,

    /// State directory (default: ~/.local/state/kforge)
    #[arg(long, global = true, env = "KFORGE_STATE")]
    pub state: Option<String>,

    /// Directory the local provider keeps resources in
    #[arg(long, global = true, env = "KFORGE_CLOUD_ROOT")]
    pub cloud_root: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(PlanArgs),

    /// Converge infrastructure to the cluster document
    Apply(ApplyArgs),

    /// Display cluster resources
    #[command(subcommand)]
    Get(GetCommand),

    /// Print the node configuration bundle of an instance group
    Nodeconfig(NodeconfigArgs),

    /// Node-side enrollment helpers
    #[command(subcommand)]
    Enroll(EnrollCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan / Apply
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Number of parallel workers (default: from settings)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Abort the run after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Print the change report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Apply without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

// ============================================================================
// Get
// ============================================================================

#[derive(Subcommand)]
pub enum GetCommand {
    /// List instance groups
    #[command(alias = "ig")]
    Instancegroups {
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

// ============================================================================
// Node config / Enroll
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct NodeconfigArgs {
    /// Instance group name
    pub instance_group: String,

    /// Print the BootConfig instead of the NodeConfig
    #[arg(long)]
    pub boot: bool,

    /// Also write both artifacts to the state directory
    #[arg(long)]
    pub write: bool,
}

#[derive(Subcommand)]
pub enum EnrollCommand {
    /// Check a fetched NodeConfig against the hash pinned in a BootConfig
    Verify {
        /// BootConfig file
        #[arg(long)]
        boot: PathBuf,

        /// Fetched NodeConfig file
        #[arg(long)]
        config: PathBuf,
    },
}
