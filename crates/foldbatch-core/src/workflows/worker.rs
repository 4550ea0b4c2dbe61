use crate::core::io::structure::{PrimaryChainConverter, StructureConverter, StructureLocator};
use crate::core::io::table::{MutationTable, output_headers};
use crate::core::models::mutation::{MutationRecord, ResultRecord};
use crate::engine::cache::RepairCache;
use crate::engine::checkpoint::CheckpointWriter;
use crate::engine::config::WorkerConfig;
use crate::engine::error::PipelineError;
use crate::engine::evaluator::MutationEvaluator;
use crate::engine::ledger::{CsvLedger, PriorProgress, ProgressLedger};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::runner::{FoldxCli, MutagenesisEngine};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Counts for one worker session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub total_mutations: usize,
    /// Mutations of the chunk already present in the output when the session started.
    pub previously_completed: usize,
    pub mutations_completed: usize,
    pub mutations_skipped: usize,
    /// Completed mutations recorded without an energy value.
    pub null_energies: usize,
    pub proteins_processed: usize,
    pub proteins_skipped: usize,
    pub budget_reached: bool,
}

impl SessionSummary {
    pub fn remaining(&self) -> usize {
        self.total_mutations
            .saturating_sub(self.previously_completed + self.mutations_completed)
    }
}

/// The mutations of one protein, in chunk order.
#[derive(Debug, Clone)]
pub struct ProteinGroup<'r> {
    pub protein_id: &'r str,
    pub records: Vec<&'r MutationRecord>,
}

impl<'r> ProteinGroup<'r> {
    /// The structure file recorded on the group's first row.
    pub fn structure_file(&self) -> &'r str {
        self.records
            .first()
            .map(|r| r.structure_file.as_str())
            .unwrap_or("")
    }
}

/// Groups records by protein, ordering groups by first appearance in the chunk.
pub fn group_by_protein(records: &[MutationRecord]) -> Vec<ProteinGroup<'_>> {
    let mut groups: IndexMap<&str, Vec<&MutationRecord>> = IndexMap::new();
    for record in records {
        groups.entry(record.protein_id()).or_default().push(record);
    }
    groups
        .into_iter()
        .map(|(protein_id, records)| ProteinGroup {
            protein_id,
            records,
        })
        .collect()
}

/// Reads a worker's chunk, optionally keeping only its first `limit` rows.
pub(crate) fn load_chunk(
    path: &Path,
    limit: Option<usize>,
) -> Result<(MutationTable, Vec<MutationRecord>), PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::MissingChunk(
            path.to_string_lossy().to_string(),
        ));
    }
    let mut table = MutationTable::read(path)?;
    if let Some(limit) = limit {
        if limit < table.len() {
            info!("Pilot mode: keeping the first {} of {} rows.", limit, table.len());
            let rows = table.rows()[..limit].to_vec();
            table = MutationTable::from_parts(
                path.to_string_lossy().to_string(),
                table.headers().clone(),
                rows,
            )?;
        }
    }
    let records = table.records()?;
    Ok((table, records))
}

fn ensure_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path).map_err(|source| PipelineError::Workspace {
        path: path.to_string_lossy().to_string(),
        source,
    })
}

/// Runs one worker session against the FoldX command line configured in `config`.
pub fn run(
    config: &WorkerConfig,
    reporter: &ProgressReporter,
) -> Result<SessionSummary, PipelineError> {
    let engine = FoldxCli::new(&config.engine);
    let converter = PrimaryChainConverter::new(config.engine.chain_id);
    let ledger = CsvLedger::new(&config.paths.output_file);
    run_with(config, &engine, &converter, &ledger, reporter)
}

/// Runs one worker session with explicit collaborators.
///
/// Every protein group is attempted at most once. Results are checkpointed after each
/// group; when a batch limit is configured the session stops after the checkpoint that
/// reaches it.
#[instrument(skip_all, name = "worker_workflow", fields(worker = config.worker_id))]
pub fn run_with(
    config: &WorkerConfig,
    engine: &dyn MutagenesisEngine,
    converter: &dyn StructureConverter,
    ledger: &dyn ProgressLedger,
    reporter: &ProgressReporter,
) -> Result<SessionSummary, PipelineError> {
    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation".to_string(),
    });
    engine.preflight().map_err(PipelineError::EngineUnavailable)?;

    let (table, records) = load_chunk(&config.paths.chunk_file, config.pilot_rows)?;
    ensure_dir(&config.paths.workspace_dir)?;
    ensure_dir(&config.paths.mutant_structure_dir)?;

    let prior = ledger.load_prior_progress()?;
    let mut writer = CheckpointWriter::new(
        &config.paths.output_file,
        output_headers(table.headers()),
        &prior,
    )?;

    let groups = group_by_protein(&records);
    let mut summary = SessionSummary {
        total_mutations: records.len(),
        previously_completed: records.iter().filter(|r| prior.is_complete(&r.key)).count(),
        ..SessionSummary::default()
    };
    info!(
        "Worker {}: {} mutations across {} proteins, {} already completed.",
        config.worker_id,
        summary.total_mutations,
        groups.len(),
        summary.previously_completed
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Evaluate pending mutations, one protein group at a time ===
    reporter.report(Progress::PhaseStart {
        name: "Evaluating mutations".to_string(),
    });
    reporter.report(Progress::TaskStart {
        total: (summary.total_mutations - summary.previously_completed) as u64,
    });

    let mut cache = RepairCache::new(
        &config.paths.workspace_dir,
        StructureLocator::new(&config.paths.structure_dir),
        converter,
        engine,
    );
    let evaluator = MutationEvaluator::new(
        &config.paths.workspace_dir,
        &config.paths.mutant_structure_dir,
        config.engine.chain_id,
        engine,
    );

    for group in &groups {
        let pending = pending_records(group, &prior);
        if pending.is_empty() {
            continue;
        }
        reporter.report(Progress::StatusUpdate {
            text: group.protein_id.to_string(),
        });

        let repaired = match cache.ensure_ready(group.protein_id, group.structure_file()) {
            Ok(name) => name,
            Err(skip) => {
                warn!(
                    "Skipping protein {} ({} pending mutations): {}",
                    group.protein_id,
                    pending.len(),
                    skip
                );
                summary.proteins_skipped += 1;
                reporter.report(Progress::Message(format!(
                    "Skipped protein {}: {}",
                    group.protein_id, skip
                )));
                reporter.report(Progress::TaskIncrement {
                    amount: pending.len() as u64,
                });
                continue;
            }
        };

        let results = evaluate_group(&evaluator, &pending, &repaired, &mut summary, reporter);
        let written = writer.append(&results)?;
        summary.mutations_completed += written;
        summary.proteins_processed += 1;
        info!(
            "Protein {}: {} of {} pending mutations recorded ({} this session).",
            group.protein_id,
            written,
            pending.len(),
            summary.mutations_completed
        );

        if let Some(limit) = config.batch_limit {
            if summary.mutations_completed >= limit {
                info!("Session batch limit of {} reached; stopping.", limit);
                reporter.report(Progress::Message(format!(
                    "Batch limit of {} reached after {} mutations",
                    limit, summary.mutations_completed
                )));
                summary.budget_reached = true;
                break;
            }
        }
    }

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    info!(
        "Session finished: {} completed, {} skipped mutations, {} skipped proteins, {} remaining.",
        summary.mutations_completed,
        summary.mutations_skipped,
        summary.proteins_skipped,
        summary.remaining()
    );
    Ok(summary)
}

fn pending_records<'r>(group: &ProteinGroup<'r>, prior: &PriorProgress) -> Vec<&'r MutationRecord> {
    group
        .records
        .iter()
        .copied()
        .filter(|r| !prior.is_complete(&r.key))
        .collect()
}

fn evaluate_group(
    evaluator: &MutationEvaluator,
    pending: &[&MutationRecord],
    repaired_file: &str,
    summary: &mut SessionSummary,
    reporter: &ProgressReporter,
) -> Vec<ResultRecord> {
    let mut results = Vec::with_capacity(pending.len());
    for record in pending {
        match evaluator.evaluate(record, repaired_file) {
            Ok(evaluation) => {
                info!("Mutation {} done. ddG: {:?}", record.key, evaluation.ddg);
                if evaluation.ddg.is_none() {
                    summary.null_energies += 1;
                }
                results.push(ResultRecord::new(
                    record,
                    evaluation.ddg,
                    evaluation.mutant_structure_file,
                ));
            }
            Err(skip) => {
                warn!("Skipping mutation {}: {}", record.key, skip);
                summary.mutations_skipped += 1;
            }
        }
        reporter.report(Progress::TaskIncrement { amount: 1 });
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::mutation::MutationKey;
    use csv::StringRecord;

    fn record(protein: &str, pos: u32) -> MutationRecord {
        MutationRecord {
            key: MutationKey::new(protein, "Ala", pos, "Val"),
            structure_file: format!("AF-{}-F1-model_v4.pdb", protein),
            row: StringRecord::new(),
        }
    }

    #[test]
    fn groups_follow_first_appearance_order() {
        let records = vec![record("P2", 1), record("P1", 1), record("P2", 2)];
        let groups = group_by_protein(&records);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].protein_id, "P2");
        assert_eq!(groups[0].records.len(), 2);
        assert_eq!(groups[0].records[1].key.position, 2);
        assert_eq!(groups[0].structure_file(), "AF-P2-F1-model_v4.pdb");
        assert_eq!(groups[1].protein_id, "P1");
    }

    #[test]
    fn pending_records_excludes_completed_keys() {
        let records = vec![record("P1", 1), record("P1", 2)];
        let groups = group_by_protein(&records);
        let mut prior = PriorProgress::default();
        prior.completed.insert(MutationKey::new("P1", "Ala", 1, "Val"));

        let pending = pending_records(&groups[0], &prior);

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key.position, 2);
    }

    #[test]
    fn remaining_never_underflows() {
        let summary = SessionSummary {
            total_mutations: 3,
            previously_completed: 2,
            mutations_completed: 1,
            ..SessionSummary::default()
        };
        assert_eq!(summary.remaining(), 0);
    }
}
