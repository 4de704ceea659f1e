use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cache::Tier;

#[derive(Parser, Debug)]
#[command(name = "localpair")]
#[command(version)]
#[command(about = "Cached code analysis for a local pair programmer", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Project directory (defaults to current directory)
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Runs the interactive shell when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show symbols of a source file
    Structure { file: PathBuf },
    /// Show per-function complexity of a source file
    Complexity { file: PathBuf },
    /// Scan a directory for line-level issues
    Issues { dir: Option<PathBuf> },
    /// Summarize the project layout
    Project,
    /// Show cache statistics
    CacheStats,
    /// Clear one cache tier, or all of them
    CacheClear {
        #[arg(long)]
        tier: Option<Tier>,
    },
    /// Initialize configuration
    Init,
    /// Read commands from stdin, keeping the cache warm between them
    Shell,
}

/// One line typed into the interactive shell
#[derive(Parser, Debug)]
#[command(name = "localpair", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// Show symbols of a source file
    Structure { file: PathBuf },
    /// Show per-function complexity of a source file
    Complexity { file: PathBuf },
    /// Scan a directory for line-level issues
    Issues { dir: Option<PathBuf> },
    /// Summarize the project layout
    Project,
    /// Show cache statistics
    #[command(alias = "cache-stats")]
    Stats,
    /// Clear one cache tier, or all of them
    Clear { tier: Option<Tier> },
    /// Drop everything cached for a file
    Invalidate { file: PathBuf },
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON structured output
    Json,
}
