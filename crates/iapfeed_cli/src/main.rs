//! iapfeed CLI: generates, validates and uploads the LI `iaps` feed.
//!
//! Provides `iapfeed run` for a full generation run, `iapfeed warm` to
//! pre-populate the inventory cache, `iapfeed upload` to re-send an existing
//! artifact, `iapfeed cache` for cache maintenance and `iapfeed status` to
//! show the last recorded run of each group.

#![warn(missing_docs)]

mod cache;
mod context;
mod logging;
mod run;
mod status;
mod upload;
mod warm;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// iapfeed: inventory to LI feed pipeline.
#[derive(Parser, Debug)]
#[command(name = "iapfeed", version, about = "LI iaps feed generator")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `iapfeed.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate, validate and upload the feed.
    Run(RunArgs),
    /// Fetch the inventory with a forced refresh to pre-populate the cache.
    Warm {
        /// Group(s) to fetch.
        #[arg(short, long, value_enum, default_value_t = GroupSelection::All)]
        group: GroupSelection,
    },
    /// Re-upload an existing artifact.
    Upload(UploadArgs),
    /// Inspect or clean the response cache.
    Cache {
        /// Cache action.
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show the last recorded run.
    Status {
        /// Group(s) to show.
        #[arg(short, long, value_enum, default_value_t = GroupSelection::All)]
        group: GroupSelection,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
}

/// Arguments for the `iapfeed run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Group(s) to generate. `all` runs every enabled group concurrently.
    #[arg(short, long, value_enum, default_value_t = GroupSelection::All)]
    pub group: GroupSelection,

    /// Ignore cached inventory responses.
    #[arg(long)]
    pub force_refresh: bool,

    /// Stop after writing and compressing the artifact.
    #[arg(long)]
    pub no_upload: bool,
}

/// Arguments for the `iapfeed upload` subcommand.
#[derive(Parser, Debug)]
pub struct UploadArgs {
    /// Group whose upload group ids are used.
    #[arg(short, long, value_enum)]
    pub group: SingleGroup,

    /// The `.xml` artifact to send.
    pub file: String,
}

/// Cache maintenance actions.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum CacheAction {
    /// Count live, expired and corrupt entries.
    Stats,
    /// Delete expired and corrupt entries.
    Purge,
    /// Delete entries, optionally only those of one operation.
    Clear {
        /// Operation name, e.g. `device_interfaces`.
        #[arg(long)]
        operation: Option<String>,
    },
}

/// Which group(s) a command applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GroupSelection {
    /// CMTS devices.
    #[value(alias = "cmts")]
    Vfz,
    /// Provider edge routers.
    Pe,
    /// Every group enabled in the configuration.
    All,
}

/// Exactly one group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SingleGroup {
    /// CMTS devices.
    #[value(alias = "cmts")]
    Vfz,
    /// Provider edge routers.
    Pe,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Status output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// The raw JSON snapshot.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => {
            std::env::var_os("NO_COLOR").is_none() && std::env::var_os("TERM").is_some()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };
    logging::init(&global);

    let result = match cli.command {
        Command::Run(ref args) => run::run(args, &global).await,
        Command::Warm { group } => warm::run(group, &global).await,
        Command::Upload(ref args) => upload::run(args, &global).await,
        Command::Cache { ref action } => cache::run(action, &global),
        Command::Status { group, format } => status::run(group, format, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
