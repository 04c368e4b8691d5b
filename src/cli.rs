use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::kinds::ResourceType;

#[derive(Parser)]
#[command(name = "sentryctl")]
#[command(version)]
#[command(about = "Declarative management of Sentry organizations, teams, projects and alerts", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// How to reach Sentry and where tracked identifiers live
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Auth token (falls back to SENTRY_AUTH_TOKEN, then SENTRY_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// API base URL, e.g. https://sentry.example.com/api/
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Overall deadline for each operation in seconds, retries included
    #[arg(long, global = true, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// State file (default: $XDG_STATE_HOME/sentryctl/state.toml)
    #[arg(long, global = true, env = "SENTRYCTL_STATE")]
    pub state: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(ManifestArgs),

    /// Create, update and delete resources to match the manifest
    Apply(ApplyArgs),

    /// Start tracking an existing object
    #[command(after_help = "Examples:
  sentryctl import team core acme/core-team
  sentryctl import metric_alert errors acme/web/177104")]
    Import(ImportArgs),

    /// Print the current remote state of an object
    Read(ReadArgs),

    /// Delete every tracked resource
    Destroy(DestroyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ManifestArgs {
    /// Manifest file
    #[arg(short, long, default_value = "sentry.toml")]
    pub manifest: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of changes applied in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Resource kind
    #[arg(value_enum)]
    pub kind: ResourceType,

    /// Local name to track the object under
    pub name: String,

    /// Identifier of the existing object, e.g. acme/core-team
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Resource kind
    #[arg(value_enum)]
    pub kind: ResourceType,

    /// Identifier, e.g. acme/core-team
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of deletes run in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}
