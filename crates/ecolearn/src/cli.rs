//! Clap derive structures for the `ecolearn` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use ecolearn_core::Category;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ecolearn -- browse and maintain the EcoLearn card catalog
#[derive(Debug, Parser)]
#[command(
    name = "ecolearn",
    version,
    about = "Browse and maintain the EcoLearn card catalog",
    long_about = "Command-line client for the EcoLearn admin API.\n\n\
        Catalog reads go through a local TTL cache that survives restarts,\n\
        and concurrent requests for the same payload share one fetch.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "ECOLEARN_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Admin API base URL (overrides profile)
    #[arg(long, short = 'u', env = "ECOLEARN_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ECOLEARN_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "ECOLEARN_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "ECOLEARN_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Keep the cache in memory only for this run
    #[arg(long, global = true)]
    pub no_snapshot: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Waste category accepted by the upload endpoint.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CategoryArg {
    Compostable,
    Recyclable,
    NonRecyclable,
    SpecialWaste,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Compostable => Self::Compostable,
            CategoryArg::Recyclable => Self::Recyclable,
            CategoryArg::NonRecyclable => Self::NonRecyclable,
            CategoryArg::SpecialWaste => Self::SpecialWaste,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List catalog cards as gallery units
    #[command(alias = "ls")]
    Cards(CardsArgs),

    /// Show per-category card counts
    Counts,

    /// Upload a new card image
    Add(UploadArgs),

    /// Replace an existing card with a new image
    Replace(ReplaceArgs),

    /// Inspect or clear the local cache
    Cache(CacheArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CARDS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CardsArgs {
    /// Only show cards in this category ("all" shows every category)
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Case-insensitive substring match on the card name
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Use the flat card list instead of the full asset repository
    #[arg(long)]
    pub fast: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  UPLOADS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Display name of the card
    #[arg(long, short = 'n')]
    pub name: String,

    /// Waste category
    #[arg(long, short = 'c', value_enum)]
    pub category: CategoryArg,

    /// Path to the card image
    pub image: PathBuf,
}

#[derive(Debug, Args)]
pub struct ReplaceArgs {
    /// ID of the card to replace
    pub id: String,

    #[command(flatten)]
    pub upload: UploadArgs,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CACHE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show cached payloads and their freshness
    Status,

    /// Drop every cached payload, in memory and on disk
    Clear,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file
    Init {
        /// Admin API base URL (prompted when omitted on a terminal)
        #[arg(long)]
        api_url: Option<String>,

        /// Name of the profile to create
        #[arg(long, default_value = "default")]
        name: String,
    },

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn category_flag_maps_to_upload_id() {
        assert_eq!(Category::from(CategoryArg::NonRecyclable).id(), 3);
        assert_eq!(Category::from(CategoryArg::SpecialWaste).id(), 4);
    }
}
