use super::config::ConfigError;
use super::ledger::LedgerError;
use super::runner::EngineFailure;
use crate::core::io::structure::ConversionError;
use crate::core::io::table::TableError;
use crate::core::models::residue::UnknownResidueCode;
use thiserror::Error;

/// Errors that halt a worker session.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Work chunk '{0}' does not exist")]
    MissingChunk(String),

    #[error("Failed to load work chunk: {0}")]
    Table(#[from] TableError),

    #[error("Prior output cannot be trusted: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Engine is unavailable: {0}")]
    EngineUnavailable(#[source] EngineFailure),

    #[error(
        "Output file '{path}' has a different header than this chunk produces (expected '{expected}', found '{found}')"
    )]
    SchemaMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("Failed to prepare directory '{path}': {source}")]
    Workspace {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write checkpoint to '{path}': {source}")]
    Checkpoint {
        path: String,
        source: std::io::Error,
    },
}

/// Reasons an entire protein group is left for a later session.
#[derive(Debug, Error)]
pub enum ProteinSkip {
    #[error("no structure file found for protein {protein_id}")]
    MissingStructure { protein_id: String },

    #[error("structure conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("repair command failed: {0}")]
    Repair(#[source] EngineFailure),

    #[error("repair command succeeded but produced no '{0}'")]
    MissingRepairArtifact(String),

    #[error("repair already failed earlier in this session")]
    PreviouslyFailed,
}

/// Reasons a single mutation is left for a later session.
#[derive(Debug, Error)]
pub enum MutationSkip {
    #[error(transparent)]
    UnknownResidue(#[from] UnknownResidueCode),

    #[error("could not write mutation list '{path}': {source}")]
    MutationList {
        path: String,
        source: std::io::Error,
    },

    #[error("mutagenesis command failed: {0}")]
    Engine(#[from] EngineFailure),
}
