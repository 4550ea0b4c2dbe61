use crate::core::io::table::chunk_path;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// Physical conditions passed to the structure repair command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RepairParams {
    pub ion_strength: f64,
    pub ph: f64,
    pub vdw_design: u32,
}

impl Default for RepairParams {
    fn default() -> Self {
        Self {
            ion_strength: 0.05,
            ph: 7.0,
            vdw_design: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub binary: PathBuf,
    pub repair: RepairParams,
    pub number_of_runs: u32,
    /// Chain the engine mutates; also the chain kept during structure conversion.
    pub chain_id: char,
}

/// Filename prefixes that tie a worker id to its chunk, output file, and workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLayout {
    pub chunk_prefix: String,
    pub output_prefix: String,
    pub workspace_prefix: String,
}

impl Default for WorkerLayout {
    fn default() -> Self {
        Self {
            chunk_prefix: "cohort_part".to_string(),
            output_prefix: "cohort_with_ddg".to_string(),
            workspace_prefix: "foldx_workspace".to_string(),
        }
    }
}

impl WorkerLayout {
    pub fn chunk_file(&self, dir: &Path, worker_id: usize) -> PathBuf {
        chunk_path(dir, &self.chunk_prefix, worker_id)
    }

    pub fn output_file(&self, dir: &Path, worker_id: usize) -> PathBuf {
        chunk_path(dir, &self.output_prefix, worker_id)
    }

    pub fn workspace_dir(&self, dir: &Path, worker_id: usize) -> PathBuf {
        dir.join(format!("{}_{}", self.workspace_prefix, worker_id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerPaths {
    pub chunk_file: PathBuf,
    pub output_file: PathBuf,
    pub workspace_dir: PathBuf,
    pub structure_dir: PathBuf,
    pub mutant_structure_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub worker_id: usize,
    pub paths: WorkerPaths,
    pub engine: EngineConfig,
    /// Stop after the group that brings newly completed mutations to this count.
    pub batch_limit: Option<usize>,
    /// Only the first N rows of the chunk are considered.
    pub pilot_rows: Option<usize>,
}

#[derive(Default)]
pub struct WorkerConfigBuilder {
    worker_id: Option<usize>,
    chunk_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    workspace_dir: Option<PathBuf>,
    structure_dir: Option<PathBuf>,
    mutant_structure_dir: Option<PathBuf>,
    engine_binary: Option<PathBuf>,
    repair: Option<RepairParams>,
    number_of_runs: Option<u32>,
    chain_id: Option<char>,
    batch_limit: Option<usize>,
    pilot_rows: Option<usize>,
}

impl WorkerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker id and derives its chunk, output, and workspace paths.
    pub fn worker(mut self, processed_dir: &Path, layout: &WorkerLayout, worker_id: usize) -> Self {
        self.worker_id = Some(worker_id);
        self.chunk_file = Some(layout.chunk_file(processed_dir, worker_id));
        self.output_file = Some(layout.output_file(processed_dir, worker_id));
        self.workspace_dir = Some(layout.workspace_dir(processed_dir, worker_id));
        self
    }

    pub fn worker_id(mut self, id: usize) -> Self {
        self.worker_id = Some(id);
        self
    }
    pub fn chunk_file(mut self, path: PathBuf) -> Self {
        self.chunk_file = Some(path);
        self
    }
    pub fn output_file(mut self, path: PathBuf) -> Self {
        self.output_file = Some(path);
        self
    }
    pub fn workspace_dir(mut self, path: PathBuf) -> Self {
        self.workspace_dir = Some(path);
        self
    }
    pub fn structure_dir(mut self, path: PathBuf) -> Self {
        self.structure_dir = Some(path);
        self
    }
    pub fn mutant_structure_dir(mut self, path: PathBuf) -> Self {
        self.mutant_structure_dir = Some(path);
        self
    }
    pub fn engine_binary(mut self, path: PathBuf) -> Self {
        self.engine_binary = Some(path);
        self
    }
    pub fn repair_params(mut self, params: RepairParams) -> Self {
        self.repair = Some(params);
        self
    }
    pub fn number_of_runs(mut self, runs: u32) -> Self {
        self.number_of_runs = Some(runs);
        self
    }
    pub fn chain_id(mut self, chain: char) -> Self {
        self.chain_id = Some(chain);
        self
    }
    pub fn batch_limit(mut self, limit: Option<usize>) -> Self {
        self.batch_limit = limit;
        self
    }
    pub fn pilot_rows(mut self, rows: Option<usize>) -> Self {
        self.pilot_rows = rows;
        self
    }

    pub fn build(self) -> Result<WorkerConfig, ConfigError> {
        let number_of_runs = self.number_of_runs.unwrap_or(1);
        if number_of_runs == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "number_of_runs",
                reason: "must be at least 1".to_string(),
            });
        }
        let chain_id = self.chain_id.unwrap_or('A');
        if !chain_id.is_ascii_alphanumeric() {
            return Err(ConfigError::InvalidValue {
                parameter: "chain_id",
                reason: format!("'{}' is not a valid chain identifier", chain_id),
            });
        }
        if self.batch_limit == Some(0) {
            return Err(ConfigError::InvalidValue {
                parameter: "batch_limit",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        if self.pilot_rows == Some(0) {
            return Err(ConfigError::InvalidValue {
                parameter: "pilot_rows",
                reason: "must be at least 1 when set".to_string(),
            });
        }

        let paths = WorkerPaths {
            chunk_file: self
                .chunk_file
                .ok_or(ConfigError::MissingParameter("chunk_file"))?,
            output_file: self
                .output_file
                .ok_or(ConfigError::MissingParameter("output_file"))?,
            workspace_dir: self
                .workspace_dir
                .ok_or(ConfigError::MissingParameter("workspace_dir"))?,
            structure_dir: self
                .structure_dir
                .ok_or(ConfigError::MissingParameter("structure_dir"))?,
            mutant_structure_dir: self
                .mutant_structure_dir
                .ok_or(ConfigError::MissingParameter("mutant_structure_dir"))?,
        };
        let engine = EngineConfig {
            binary: self
                .engine_binary
                .ok_or(ConfigError::MissingParameter("engine_binary"))?,
            repair: self.repair.unwrap_or_default(),
            number_of_runs,
            chain_id,
        };
        Ok(WorkerConfig {
            worker_id: self
                .worker_id
                .ok_or(ConfigError::MissingParameter("worker_id"))?,
            paths,
            engine,
            batch_limit: self.batch_limit,
            pilot_rows: self.pilot_rows,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionConfig {
    pub input_file: PathBuf,
    pub chunks: usize,
    pub output_dir: PathBuf,
    pub chunk_prefix: String,
}

#[derive(Default)]
pub struct PartitionConfigBuilder {
    input_file: Option<PathBuf>,
    chunks: Option<usize>,
    output_dir: Option<PathBuf>,
    chunk_prefix: Option<String>,
}

impl PartitionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_file(mut self, path: PathBuf) -> Self {
        self.input_file = Some(path);
        self
    }
    pub fn chunks(mut self, n: usize) -> Self {
        self.chunks = Some(n);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn chunk_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.chunk_prefix = Some(prefix.into());
        self
    }

    pub fn build(self) -> Result<PartitionConfig, ConfigError> {
        let chunks = self.chunks.ok_or(ConfigError::MissingParameter("chunks"))?;
        if chunks == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "chunks",
                reason: "must be at least 1".to_string(),
            });
        }
        let chunk_prefix = self
            .chunk_prefix
            .unwrap_or_else(|| WorkerLayout::default().chunk_prefix);
        if chunk_prefix.is_empty() || chunk_prefix.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                parameter: "chunk_prefix",
                reason: format!("'{}' is not a usable filename prefix", chunk_prefix),
            });
        }
        Ok(PartitionConfig {
            input_file: self
                .input_file
                .ok_or(ConfigError::MissingParameter("input_file"))?,
            chunks,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            chunk_prefix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::new()
            .worker(Path::new("/data/processed"), &WorkerLayout::default(), 3)
            .structure_dir(PathBuf::from("/data/raw"))
            .mutant_structure_dir(PathBuf::from("/data/processed/structures"))
            .engine_binary(PathBuf::from("/opt/foldx/foldx"))
    }

    #[test]
    fn worker_layout_derives_per_worker_paths() {
        let config = complete_builder().build().unwrap();
        assert_eq!(config.worker_id, 3);
        assert_eq!(
            config.paths.chunk_file,
            PathBuf::from("/data/processed/cohort_part_3.csv")
        );
        assert_eq!(
            config.paths.output_file,
            PathBuf::from("/data/processed/cohort_with_ddg_3.csv")
        );
        assert_eq!(
            config.paths.workspace_dir,
            PathBuf::from("/data/processed/foldx_workspace_3")
        );
    }

    #[test]
    fn build_applies_engine_defaults() {
        let config = complete_builder().build().unwrap();
        assert_eq!(config.engine.repair, RepairParams::default());
        assert_eq!(config.engine.repair.ion_strength, 0.05);
        assert_eq!(config.engine.repair.vdw_design, 2);
        assert_eq!(config.engine.number_of_runs, 1);
        assert_eq!(config.engine.chain_id, 'A');
        assert_eq!(config.batch_limit, None);
    }

    #[test]
    fn build_fails_if_engine_binary_is_missing() {
        let result = WorkerConfigBuilder::new()
            .worker(Path::new("/p"), &WorkerLayout::default(), 1)
            .structure_dir(PathBuf::from("/s"))
            .mutant_structure_dir(PathBuf::from("/m"))
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("engine_binary")));
    }

    #[test]
    fn build_rejects_zero_limits_and_bad_chain() {
        assert!(matches!(
            complete_builder().batch_limit(Some(0)).build(),
            Err(ConfigError::InvalidValue {
                parameter: "batch_limit",
                ..
            })
        ));
        assert!(matches!(
            complete_builder().number_of_runs(0).build(),
            Err(ConfigError::InvalidValue {
                parameter: "number_of_runs",
                ..
            })
        ));
        assert!(matches!(
            complete_builder().chain_id(' ').build(),
            Err(ConfigError::InvalidValue {
                parameter: "chain_id",
                ..
            })
        ));
    }

    #[test]
    fn partition_builder_requires_positive_chunk_count() {
        let result = PartitionConfigBuilder::new()
            .input_file(PathBuf::from("in.csv"))
            .output_dir(PathBuf::from("out"))
            .chunks(0)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                parameter: "chunks",
                ..
            })
        ));
    }

    #[test]
    fn partition_builder_defaults_the_prefix() {
        let config = PartitionConfigBuilder::new()
            .input_file(PathBuf::from("in.csv"))
            .output_dir(PathBuf::from("out"))
            .chunks(4)
            .build()
            .unwrap();
        assert_eq!(config.chunk_prefix, "cohort_part");
    }
}
