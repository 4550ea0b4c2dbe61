use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "foldbatch - A resumable batch driver that estimates per-mutation ddG with a FoldX-compatible engine.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory that relative paths from the configuration are resolved against.
    /// Defaults to the current directory.
    #[arg(long, global = true, value_name = "PATH")]
    pub base_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split a filtered mutation table into per-worker chunks, heaviest proteins first.
    Split(SplitArgs),
    /// Run (or resume) one worker over its chunk.
    Run(RunArgs),
    /// Show how far a worker has progressed through its chunk.
    Status(StatusArgs),
}

/// Arguments for the `split` subcommand.
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Path to the filtered mutation table (CSV).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Number of chunks to produce.
    #[arg(short = 'n', long, required = true, value_name = "INT")]
    pub chunks: usize,

    /// Directory for the chunk files. Overrides `paths.processed-dir`.
    #[arg(short, long, value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Chunk filename prefix. Overrides `paths.chunk-prefix`.
    #[arg(short, long, value_name = "PREFIX")]
    pub prefix: Option<String>,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Worker id; selects the chunk, output file, and workspace.
    #[arg(short, long, required = true, value_name = "ID")]
    pub worker_id: usize,

    /// Stop after at least this many mutations have been recorded in this session.
    #[arg(short, long, value_name = "INT")]
    pub batch_size: Option<usize>,

    /// Only process the first N rows of the chunk.
    #[arg(long, value_name = "INT")]
    pub pilot: Option<usize>,

    /// Path to the engine executable. Overrides `engine.binary`.
    #[arg(long, value_name = "PATH")]
    pub foldx: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S engine.repair.ph=7.4
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `status` subcommand.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Worker id to inspect.
    #[arg(short, long, required = true, value_name = "ID")]
    pub worker_id: usize,
}
