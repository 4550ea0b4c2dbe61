use super::worker::{group_by_protein, load_chunk};
use crate::core::naming::{ArtifactKind, artifact_name};
use crate::engine::config::WorkerConfig;
use crate::engine::error::PipelineError;
use crate::engine::ledger::{CsvLedger, ProgressLedger};

/// A read-only snapshot of one worker's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub worker_id: usize,
    pub total_mutations: usize,
    pub completed: usize,
    pub pending: usize,
    pub proteins: usize,
    /// Proteins whose repaired structure is already in the workspace.
    pub proteins_repaired: usize,
    /// Rows in the output file, including any that do not belong to the chunk.
    pub output_rows: usize,
    /// The output file ends mid-record; the next `run` will repair it.
    pub output_tail_torn: bool,
}

/// Compares a worker's chunk against its output file without modifying either.
pub fn status(config: &WorkerConfig) -> Result<StatusReport, PipelineError> {
    let (_, records) = load_chunk(&config.paths.chunk_file, None)?;
    let prior = CsvLedger::read_only(&config.paths.output_file).load_prior_progress()?;

    let completed = records
        .iter()
        .filter(|r| prior.is_complete(&r.key))
        .count();
    let groups = group_by_protein(&records);
    let proteins_repaired = groups
        .iter()
        .filter(|g| {
            config
                .paths
                .workspace_dir
                .join(artifact_name(g.protein_id, ArtifactKind::Repaired))
                .is_file()
        })
        .count();

    Ok(StatusReport {
        worker_id: config.worker_id,
        total_mutations: records.len(),
        completed,
        pending: records.len() - completed,
        proteins: groups.len(),
        proteins_repaired,
        output_rows: prior.rows,
        output_tail_torn: prior.tail_was_torn,
    })
}
