use super::error::ProteinSkip;
use super::runner::MutagenesisEngine;
use crate::core::io::structure::{StructureConverter, StructureLocator};
use crate::core::naming::{ArtifactKind, artifact_name};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairState {
    Absent,
    Ready,
    Failed,
}

/// Per-protein repaired structures inside one worker's private workspace.
///
/// A repaired artifact on disk is the only record of readiness, so a restarted worker
/// picks up where the previous one stopped. Failures are remembered for the current session
/// only and retried by the next one.
pub struct RepairCache<'a> {
    workspace: PathBuf,
    locator: StructureLocator,
    converter: &'a dyn StructureConverter,
    engine: &'a dyn MutagenesisEngine,
    failed: HashSet<String>,
}

impl<'a> RepairCache<'a> {
    pub fn new(
        workspace: impl Into<PathBuf>,
        locator: StructureLocator,
        converter: &'a dyn StructureConverter,
        engine: &'a dyn MutagenesisEngine,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            locator,
            converter,
            engine,
            failed: HashSet::new(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn repaired_path(&self, protein_id: &str) -> PathBuf {
        self.workspace
            .join(artifact_name(protein_id, ArtifactKind::Repaired))
    }

    pub fn state(&self, protein_id: &str) -> RepairState {
        if self.failed.contains(protein_id) {
            RepairState::Failed
        } else if self.repaired_path(protein_id).is_file() {
            RepairState::Ready
        } else {
            RepairState::Absent
        }
    }

    /// Makes the protein's repaired structure available, repairing it if necessary.
    ///
    /// Returns the repaired artifact's filename relative to the workspace.
    pub fn ensure_ready(
        &mut self,
        protein_id: &str,
        recorded_structure: &str,
    ) -> Result<String, ProteinSkip> {
        match self.state(protein_id) {
            RepairState::Ready => {
                debug!("Reusing repaired structure for {}", protein_id);
                return Ok(artifact_name(protein_id, ArtifactKind::Repaired));
            }
            RepairState::Failed => return Err(ProteinSkip::PreviouslyFailed),
            RepairState::Absent => {}
        }

        match self.repair(protein_id, recorded_structure) {
            Ok(name) => Ok(name),
            Err(skip) => {
                warn!("Repair of {} failed: {}", protein_id, skip);
                self.failed.insert(protein_id.to_string());
                Err(skip)
            }
        }
    }

    fn repair(&self, protein_id: &str, recorded_structure: &str) -> Result<String, ProteinSkip> {
        let source = self
            .locator
            .resolve(protein_id, recorded_structure)
            .ok_or_else(|| ProteinSkip::MissingStructure {
                protein_id: protein_id.to_string(),
            })?;

        let input_name = artifact_name(protein_id, ArtifactKind::SourceStructure);
        let atoms = self
            .converter
            .convert(&source, &self.workspace.join(&input_name))?;
        info!(
            "Repairing {} ({} atoms from {:?})",
            protein_id, atoms, source
        );

        self.engine
            .repair(&self.workspace, &input_name)
            .map_err(ProteinSkip::Repair)?;

        let repaired_name = artifact_name(protein_id, ArtifactKind::Repaired);
        if !self.workspace.join(&repaired_name).is_file() {
            return Err(ProteinSkip::MissingRepairArtifact(repaired_name));
        }
        Ok(repaired_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::structure::ConversionError;
    use crate::engine::runner::EngineFailure;
    use std::cell::Cell;
    use std::fs;
    use tempfile::tempdir;

    struct CopyConverter;

    impl StructureConverter for CopyConverter {
        fn convert(&self, source: &Path, destination: &Path) -> Result<usize, ConversionError> {
            fs::copy(source, destination).map_err(|e| ConversionError::Io {
                path: source.to_string_lossy().into(),
                source: e,
            })?;
            Ok(1)
        }
    }

    struct RepairOnly {
        produce_artifact: bool,
        succeed: bool,
        repairs: Cell<usize>,
    }

    impl RepairOnly {
        fn new(succeed: bool, produce_artifact: bool) -> Self {
            Self {
                produce_artifact,
                succeed,
                repairs: Cell::new(0),
            }
        }
    }

    impl MutagenesisEngine for RepairOnly {
        fn preflight(&self) -> Result<(), EngineFailure> {
            Ok(())
        }

        fn repair(&self, workspace: &Path, structure_file: &str) -> Result<(), EngineFailure> {
            self.repairs.set(self.repairs.get() + 1);
            if !self.succeed {
                return Err(EngineFailure::Exit {
                    command: "repair".into(),
                    code: Some(1),
                });
            }
            if self.produce_artifact {
                let stem = structure_file.trim_end_matches(".pdb");
                fs::write(workspace.join(format!("{}_Repair.pdb", stem)), "END\n").unwrap();
            }
            Ok(())
        }

        fn build_model(&self, _: &Path, _: &str, _: &str) -> Result<(), EngineFailure> {
            unreachable!("repair cache never builds models")
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        structures: PathBuf,
        workspace: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let structures = dir.path().join("structures");
        let workspace = dir.path().join("workspace");
        fs::create_dir_all(&structures).unwrap();
        fs::create_dir_all(&workspace).unwrap();
        fs::write(structures.join("AF-P1-F1-model_v4.pdb"), "ATOM\n").unwrap();
        Fixture {
            _dir: dir,
            structures,
            workspace,
        }
    }

    #[test]
    fn absent_protein_is_converted_and_repaired_once() {
        let fx = fixture();
        let engine = RepairOnly::new(true, true);
        let mut cache = RepairCache::new(
            &fx.workspace,
            StructureLocator::new(&fx.structures),
            &CopyConverter,
            &engine,
        );

        assert_eq!(cache.state("P1"), RepairState::Absent);
        let name = cache.ensure_ready("P1", "AF-P1-F1-model_v4.pdb").unwrap();
        assert_eq!(name, "P1_Repair.pdb");
        assert!(fx.workspace.join("P1.pdb").is_file());
        assert_eq!(cache.state("P1"), RepairState::Ready);

        cache.ensure_ready("P1", "AF-P1-F1-model_v4.pdb").unwrap();
        assert_eq!(engine.repairs.get(), 1);
    }

    #[test]
    fn existing_artifact_is_reused_without_invoking_engine() {
        let fx = fixture();
        fs::write(fx.workspace.join("P9_Repair.pdb"), "END\n").unwrap();
        let engine = RepairOnly::new(true, true);
        let mut cache = RepairCache::new(
            &fx.workspace,
            StructureLocator::new(&fx.structures),
            &CopyConverter,
            &engine,
        );

        cache.ensure_ready("P9", "unused.pdb").unwrap();
        assert_eq!(engine.repairs.get(), 0);
    }

    #[test]
    fn repair_failure_is_remembered_for_the_session() {
        let fx = fixture();
        let engine = RepairOnly::new(false, false);
        let mut cache = RepairCache::new(
            &fx.workspace,
            StructureLocator::new(&fx.structures),
            &CopyConverter,
            &engine,
        );

        assert!(matches!(
            cache.ensure_ready("P1", "AF-P1-F1-model_v4.pdb"),
            Err(ProteinSkip::Repair(_))
        ));
        assert_eq!(cache.state("P1"), RepairState::Failed);
        assert!(matches!(
            cache.ensure_ready("P1", "AF-P1-F1-model_v4.pdb"),
            Err(ProteinSkip::PreviouslyFailed)
        ));
        assert_eq!(engine.repairs.get(), 1);
    }

    #[test]
    fn zero_exit_without_artifact_is_a_failure() {
        let fx = fixture();
        let engine = RepairOnly::new(true, false);
        let mut cache = RepairCache::new(
            &fx.workspace,
            StructureLocator::new(&fx.structures),
            &CopyConverter,
            &engine,
        );

        assert!(matches!(
            cache.ensure_ready("P1", "AF-P1-F1-model_v4.pdb"),
            Err(ProteinSkip::MissingRepairArtifact(name)) if name == "P1_Repair.pdb"
        ));
    }

    #[test]
    fn missing_structure_skips_protein() {
        let fx = fixture();
        let engine = RepairOnly::new(true, true);
        let mut cache = RepairCache::new(
            &fx.workspace,
            StructureLocator::new(&fx.structures),
            &CopyConverter,
            &engine,
        );

        assert!(matches!(
            cache.ensure_ready("P2", "AF-P2-F1-model_v4.pdb"),
            Err(ProteinSkip::MissingStructure { .. })
        ));
        assert_eq!(engine.repairs.get(), 0);
    }
}
