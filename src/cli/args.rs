//! CLI argument definitions using clap derive

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Rigger - declarative build, test and release tasks for Kubernetes operators
///
/// Runs named tasks in dependency order, provisions pinned tools on demand,
/// and gates releases on tag creation.
#[derive(Parser, Debug)]
#[command(name = "rigger")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Project file (defaults to the nearest rigger.toml)
    #[arg(short, long, global = true, env = "RIGGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Image reference to build and push
    #[arg(long, global = true, env = "IMG")]
    pub img: Option<String>,

    /// Target platforms (comma-separated)
    #[arg(long, global = true, env = "PLATFORMS", value_delimiter = ',')]
    pub platforms: Option<Vec<String>>,

    /// Release version
    #[arg(long = "release-version", global = true, env = "VERSION")]
    pub release_version: Option<String>,

    /// Run tests against an already-running cluster
    #[arg(
        long,
        global = true,
        env = "USE_EXISTING_CLUSTER",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub use_existing_cluster: Option<bool>,

    /// Log format (overrides general.log_format)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run tasks and their dependencies
    Run(RunArgs),

    /// List documented tasks
    List(ListArgs),

    /// Validate the task graph
    Check,

    /// Show or provision tools
    Tools(ToolsArgs),

    /// Tag, changelog, release and publish a version
    Release(ReleaseArgs),

    /// Build, push or inspect the multi-arch image
    Image(ImageArgs),

    /// Remove provisioned tools and coverage artifacts
    Clean(CleanArgs),

    /// Show resolved configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Tasks to run
    #[arg(required = true)]
    pub tasks: Vec<String>,

    /// Print the execution plan without running anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Run up to N independent tasks at once
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ToolsArgs {
    #[command(subcommand)]
    pub action: Option<ToolsAction>,
}

#[derive(Subcommand, Debug)]
pub enum ToolsAction {
    /// Show declared tools and whether they are installed
    List {
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Provision tools (all declared tools when none are named)
    Ensure {
        names: Vec<String>,
    },
}

#[derive(Parser, Debug)]
pub struct ReleaseArgs {
    /// Version to release (defaults to --release-version / VERSION)
    #[arg(id = "target_version", value_name = "VERSION")]
    pub version: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ImageArgs {
    #[command(subcommand)]
    pub action: ImageAction,
}

#[derive(Subcommand, Debug)]
pub enum ImageAction {
    /// Build for every platform without publishing
    Build,

    /// Build and publish, unless the reference already exists
    Push,

    /// Check whether a reference is published
    Inspect {
        /// Image reference (defaults to the configured image)
        reference: Option<String>,
    },
}

#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration as TOML
    Show,

    /// Print the configuration file path
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Names only, one per line
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}
