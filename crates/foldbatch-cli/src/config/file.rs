use crate::error::{CliError, Result};
use foldbatch::engine::config::RepairParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FilePathsConfig {
    pub processed_dir: Option<PathBuf>,
    pub structure_dir: Option<PathBuf>,
    pub mutant_structure_dir: Option<PathBuf>,
    pub chunk_prefix: Option<String>,
    pub output_prefix: Option<String>,
    pub workspace_prefix: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileEngineConfig {
    pub binary: Option<PathBuf>,
    pub number_of_runs: Option<u32>,
    pub chain: Option<char>,
    pub repair: Option<RepairParams>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub paths: Option<FilePathsConfig>,
    pub engine: Option<FileEngineConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading configuration file {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
