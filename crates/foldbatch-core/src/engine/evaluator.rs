use super::error::MutationSkip;
use super::runner::MutagenesisEngine;
use crate::core::io::report::read_energy;
use crate::core::models::mutation::MutationRecord;
use crate::core::naming::{ArtifactKind, MUTATION_LIST_FILE, artifact_name, mutant_structure_name};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The outcome of one successful mutagenesis run.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub ddg: Option<f64>,
    /// Filename of the relocated mutant structure; empty when the engine produced none.
    pub mutant_structure_file: String,
}

pub struct MutationEvaluator<'a> {
    workspace: PathBuf,
    mutant_structure_dir: PathBuf,
    chain_id: char,
    engine: &'a dyn MutagenesisEngine,
}

impl<'a> MutationEvaluator<'a> {
    pub fn new(
        workspace: impl Into<PathBuf>,
        mutant_structure_dir: impl Into<PathBuf>,
        chain_id: char,
        engine: &'a dyn MutagenesisEngine,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            mutant_structure_dir: mutant_structure_dir.into(),
            chain_id,
            engine,
        }
    }

    /// Runs the engine for one mutation against an already repaired structure.
    ///
    /// Only a failure to describe or run the mutation is an error. A missing report or
    /// mutant model still yields an [`Evaluation`], with the missing parts left empty.
    pub fn evaluate(
        &self,
        record: &MutationRecord,
        repaired_file: &str,
    ) -> Result<Evaluation, MutationSkip> {
        let protein_id = record.protein_id();
        let code = record.mutation_code()?;

        // A previous run may have died mid-mutation; its report or model would be misread as ours.
        self.purge_transients(protein_id);
        self.remove_artifact(protein_id, ArtifactKind::MutantModel);

        let list_path = self.workspace.join(MUTATION_LIST_FILE);
        fs::write(&list_path, format!("{};", code.engine_token(self.chain_id))).map_err(
            |source| MutationSkip::MutationList {
                path: list_path.to_string_lossy().to_string(),
                source,
            },
        )?;

        let outcome = self
            .engine
            .build_model(&self.workspace, repaired_file, MUTATION_LIST_FILE);
        if let Err(failure) = outcome {
            self.purge_transients(protein_id);
            self.remove_artifact(protein_id, ArtifactKind::MutantModel);
            return Err(failure.into());
        }

        let report = self
            .workspace
            .join(artifact_name(protein_id, ArtifactKind::DifferenceReport));
        let ddg = read_energy(&report);
        if ddg.is_none() {
            warn!(
                "No energy could be read for {} {}; recording an empty value.",
                protein_id, code
            );
        }

        let final_name = mutant_structure_name(protein_id, &code);
        let generated = self
            .workspace
            .join(artifact_name(protein_id, ArtifactKind::MutantModel));
        let mutant_structure_file = if generated.is_file() {
            match relocate(&generated, &self.mutant_structure_dir.join(&final_name)) {
                Ok(()) => final_name,
                Err(e) => {
                    warn!("Could not relocate mutant structure for {} {}: {}", protein_id, code, e);
                    String::new()
                }
            }
        } else {
            warn!("Mutant structure not generated for {} {}", protein_id, code);
            String::new()
        };

        self.purge_transients(protein_id);
        Ok(Evaluation {
            ddg,
            mutant_structure_file,
        })
    }

    fn purge_transients(&self, protein_id: &str) {
        for kind in ArtifactKind::TRANSIENT {
            self.remove_artifact(protein_id, kind);
        }
    }

    fn remove_artifact(&self, protein_id: &str, kind: ArtifactKind) {
        let path = self.workspace.join(artifact_name(protein_id, kind));
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed {:?}", path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove engine artifact {:?}: {}", path, e),
        }
    }
}

/// Moves a file, copying across filesystems when a plain rename is not possible.
fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}
