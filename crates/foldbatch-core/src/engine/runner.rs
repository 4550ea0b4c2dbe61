use super::config::{EngineConfig, RepairParams};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EngineFailure {
    #[error("Engine binary not found at '{0}'")]
    NotFound(String),
    #[error("Failed to launch '{command}': {source}")]
    Launch { command: String, source: io::Error },
    #[error("'{command}' exited with {}", exit_label(.code))]
    Exit { command: String, code: Option<i32> },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// The two commands the pipeline needs from the external engine.
///
/// Both run with the worker's workspace as the working directory and take filenames relative
/// to it. A returned `Ok` only means the command exited successfully; callers check for the
/// artifacts themselves.
pub trait MutagenesisEngine {
    /// Verifies the engine can be launched at all; failure here halts the worker.
    fn preflight(&self) -> Result<(), EngineFailure>;

    fn repair(&self, workspace: &Path, structure_file: &str) -> Result<(), EngineFailure>;

    fn build_model(
        &self,
        workspace: &Path,
        repaired_file: &str,
        mutation_list_file: &str,
    ) -> Result<(), EngineFailure>;
}

/// Drives a FoldX-compatible executable.
#[derive(Debug, Clone)]
pub struct FoldxCli {
    binary: PathBuf,
    repair: RepairParams,
    number_of_runs: u32,
}

impl FoldxCli {
    pub fn new(config: &EngineConfig) -> Self {
        // Commands run inside the workspace, so a relative binary path must be anchored first.
        let binary = std::path::absolute(&config.binary).unwrap_or_else(|_| config.binary.clone());
        Self {
            binary,
            repair: config.repair,
            number_of_runs: config.number_of_runs,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn repair_args(&self, structure_file: &str) -> Vec<String> {
        vec![
            "--command=RepairPDB".to_string(),
            format!("--pdb={}", structure_file),
            format!("--ionStrength={}", self.repair.ion_strength),
            format!("--pH={}", self.repair.ph),
            format!("--vdwDesign={}", self.repair.vdw_design),
        ]
    }

    fn build_model_args(&self, repaired_file: &str, mutation_list_file: &str) -> Vec<String> {
        vec![
            "--command=BuildModel".to_string(),
            format!("--pdb={}", repaired_file),
            format!("--mutant-file={}", mutation_list_file),
            format!("--numberOfRuns={}", self.number_of_runs),
        ]
    }

    fn invoke(&self, workspace: &Path, args: &[String]) -> Result<(), EngineFailure> {
        let command = format!("{} {}", self.binary.display(), args.join(" "));
        debug!("Running in {:?}: {}", workspace, command);
        let status = Command::new(&self.binary)
            .args(args)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| EngineFailure::Launch {
                command: command.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(EngineFailure::Exit {
                command,
                code: status.code(),
            })
        }
    }
}

impl MutagenesisEngine for FoldxCli {
    fn preflight(&self) -> Result<(), EngineFailure> {
        if self.binary.is_file() {
            Ok(())
        } else {
            Err(EngineFailure::NotFound(
                self.binary.to_string_lossy().to_string(),
            ))
        }
    }

    fn repair(&self, workspace: &Path, structure_file: &str) -> Result<(), EngineFailure> {
        self.invoke(workspace, &self.repair_args(structure_file))
    }

    fn build_model(
        &self,
        workspace: &Path,
        repaired_file: &str,
        mutation_list_file: &str,
    ) -> Result<(), EngineFailure> {
        self.invoke(
            workspace,
            &self.build_model_args(repaired_file, mutation_list_file),
        )
    }
}
