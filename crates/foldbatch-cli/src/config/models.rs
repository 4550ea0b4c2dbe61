use foldbatch::engine::config::{RepairParams, WorkerLayout};
use std::path::PathBuf;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub base_dir: Option<PathBuf>,
}

/// File, `--set`, and default values merged, with paths resolved against the base directory.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub processed_dir: PathBuf,
    pub structure_dir: PathBuf,
    pub mutant_structure_dir: PathBuf,
    pub layout: WorkerLayout,
    pub engine_binary: PathBuf,
    pub number_of_runs: u32,
    pub chain_id: char,
    pub repair: RepairParams,
}
