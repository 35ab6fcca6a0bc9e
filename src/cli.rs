use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "contrib-impact",
    version,
    about = "Rank repository contributors by activity impact and judged quality"
)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect, score and write a snapshot
    Run(RunCommand),
    /// Render a previously written snapshot
    Report(ReportCommand),
}

#[derive(Args)]
pub struct RunCommand {
    /// Directory searched for impact.toml
    #[arg(long, default_value = ".")]
    pub config_dir: PathBuf,
    /// Repository as owner/name
    #[arg(long)]
    pub repo: Option<String>,
    /// Lookback window in days
    #[arg(long)]
    pub days: Option<u32>,
    /// Maximum number of listed items to consume
    #[arg(long)]
    pub limit: Option<usize>,
    /// Snapshot path
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Replay events from a JSON fixture instead of the hosting API
    #[arg(long)]
    pub source_file: Option<PathBuf>,
    /// Skip quality judgment and keep baseline scores
    #[arg(long)]
    pub no_judge: bool,
    #[arg(short, long, value_enum, default_value = "md")]
    pub format: SummaryFormat,
}

#[derive(Args)]
pub struct ReportCommand {
    pub snapshot: PathBuf,
    #[arg(short, long, value_enum, default_value = "md")]
    pub format: ReportFormat,
    /// Number of contributors shown
    #[arg(long, default_value_t = 15)]
    pub top: usize,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    Json,
    Md,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SummaryFormat {
    Json,
    Md,
    None,
}
