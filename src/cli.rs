use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::resource::Category;

#[derive(Parser)]
#[command(name = "orgsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative reconciliation of GitHub organization settings", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding orgsync.toml and the declaration files
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Organization to manage (overrides the settings file)
    #[arg(long, global = true)]
    pub org: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change, without prompting or writing
    Diff(DiffArgs),

    /// Make the organization match the declarations
    Apply(ApplyArgs),

    /// Capture and inspect snapshots of live state
    #[command(subcommand)]
    Snapshot(SnapshotCommand),

    /// Make the organization match a snapshot
    Restore(RestoreArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Diff / Apply
// ============================================================================

#[derive(Args, Debug, Default)]
pub struct CategoryFilter {
    /// Only these categories (comma-separated)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub only: Vec<Category>,
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub filter: CategoryFilter,

    /// Narrow to one category or one key: "teams" or "teams.Core"
    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub filter: CategoryFilter,

    /// Narrow to one category or one key: "teams" or "teams.Core"
    #[arg(long)]
    pub target: Option<String>,

    /// Show what would happen without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Apply every change without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Do not capture a snapshot before the first change
    #[arg(long)]
    pub no_snapshot: bool,

    /// Re-send every declared secret
    #[arg(long)]
    pub rotate_secrets: bool,
}

// ============================================================================
// Snapshots
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Capture live state of every declared category
    Capture(CategoryFilter),

    /// List snapshots, most recent first
    List,

    /// Print a snapshot
    Show {
        /// Snapshot locator, as printed by `snapshot list`
        locator: String,
    },
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Snapshot locator, as printed by `snapshot list`
    #[arg(required_unless_present = "latest", conflicts_with = "latest")]
    pub locator: Option<String>,

    /// Restore the most recent snapshot
    #[arg(long)]
    pub latest: bool,

    #[command(flatten)]
    pub filter: CategoryFilter,

    /// Show what would happen without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Apply every change without asking
    #[arg(short, long)]
    pub yes: bool,
}
