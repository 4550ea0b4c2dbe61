//! Filenames of the artifacts the external engine reads and writes.
//!
//! The engine derives every output name from its input name by fixed conventions. These are
//! captured here as a pure function of the protein identifier and the artifact kind so the
//! rest of the pipeline never does string surgery on paths.

use crate::core::models::mutation::MutationCode;

/// The per-run mutation description file read by the mutagenesis command.
pub const MUTATION_LIST_FILE: &str = "individual_list.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Primary-chain PDB transcribed from the upstream structure.
    SourceStructure,
    /// Output of the repair command; reused by every mutation of the protein.
    Repaired,
    /// Energy log written by the repair command.
    RepairReport,
    /// Delta-energy report written by the mutagenesis command.
    DifferenceReport,
    RawReport,
    PdbListReport,
    AverageReport,
    /// Mutant structure produced by the first mutagenesis run.
    MutantModel,
    /// Wild-type reference model some engine versions write next to the mutant.
    WildTypeModel,
    MutationList,
}

impl ArtifactKind {
    /// Per-invocation artifacts that are removed once a mutation has been evaluated.
    pub const TRANSIENT: [ArtifactKind; 6] = [
        ArtifactKind::DifferenceReport,
        ArtifactKind::RawReport,
        ArtifactKind::PdbListReport,
        ArtifactKind::AverageReport,
        ArtifactKind::WildTypeModel,
        ArtifactKind::MutationList,
    ];
}

pub fn artifact_name(protein_id: &str, kind: ArtifactKind) -> String {
    let repaired_stem = format!("{}_Repair", protein_id);
    match kind {
        ArtifactKind::SourceStructure => format!("{}.pdb", protein_id),
        ArtifactKind::Repaired => format!("{}.pdb", repaired_stem),
        ArtifactKind::RepairReport => format!("{}.fxout", repaired_stem),
        ArtifactKind::DifferenceReport => format!("Dif_{}.fxout", repaired_stem),
        ArtifactKind::RawReport => format!("Raw_{}.fxout", repaired_stem),
        ArtifactKind::PdbListReport => format!("PdbList_{}.fxout", repaired_stem),
        ArtifactKind::AverageReport => format!("Average_{}.fxout", repaired_stem),
        ArtifactKind::MutantModel => format!("{}_1.pdb", repaired_stem),
        ArtifactKind::WildTypeModel => format!("WT_{}_1.pdb", repaired_stem),
        ArtifactKind::MutationList => MUTATION_LIST_FILE.to_string(),
    }
}

/// Stable, human-readable name of a relocated mutant structure, e.g. `P12345_E10D.pdb`.
pub fn mutant_structure_name(protein_id: &str, code: &MutationCode) -> String {
    format!("{}_{}.pdb", protein_id, code)
}
