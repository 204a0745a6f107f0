use std::path::PathBuf;

use clap::Parser;

use mergeline_core::SchedulerPolicy;

/// Compare two text files line by line, highlighting changed characters.
///
/// Replaced lines are matched character by character on background worker
/// threads; results are printed once every match has been delivered.
#[derive(Parser, Debug)]
#[command(name = "mergeline", version, about = "Line and inline diff of two files")]
pub struct CliArgs {
    /// Original file
    pub left: PathBuf,

    /// Modified file
    pub right: PathBuf,

    /// Path to a TOML matcher config
    #[arg(long, env = "MERGELINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Worker thread count (0 = one per CPU); overrides the config file
    #[arg(long)]
    pub workers: Option<usize>,

    /// Scheduler policy: fifo or lifo; overrides the config file
    #[arg(long)]
    pub policy: Option<SchedulerPolicy>,

    /// Print coordinator metrics as JSON after the diff
    #[arg(long)]
    pub stats: bool,

    /// Give up after this many main-loop ticks
    #[arg(long)]
    pub max_ticks: Option<u64>,
}
