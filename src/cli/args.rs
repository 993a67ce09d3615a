//! Command-line arguments

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    ab::AbArgs, completions::CompletionsArgs, funnel::FunnelArgs, merge::MergeArgs,
    report::ReportArgs,
};

#[derive(Parser, Debug)]
#[command(name = "funnelkit", version)]
#[command(about = "Conversion funnel and A/B test analysis over plain CSV event tables")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge the source tables into one row per user and export it
    Merge(MergeArgs),

    /// Funnel reach, conversion metrics and funnels by gender and device
    Funnel(FunnelArgs),

    /// A/B conversion by variant and chi-square significance test
    Ab(AbArgs),

    /// Full analysis report (funnel, A/B and significance)
    Report(ReportArgs),

    /// Generate a shell completion script
    Completions(CompletionsArgs),
}

/// Options shared by every command
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Directory holding the source CSV tables
    #[arg(long, global = true, env = "FUNNELKIT_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Config file (defaults to funnelkit.yaml in the data directory)
    #[arg(long, short = 'c', global = true, env = "FUNNELKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "auto")]
    pub output: OutputFormat,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl GlobalOpts {
    /// Log level used when RUST_LOG is not set
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

/// Output format for command results
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pick per command (terminal view, or JSON for `report`)
    #[default]
    Auto,
    /// Terminal charts and tables
    Table,
    Json,
    Yaml,
    Csv,
    Tsv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Auto => write!(f, "auto"),
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Tsv => write!(f, "tsv"),
        }
    }
}
