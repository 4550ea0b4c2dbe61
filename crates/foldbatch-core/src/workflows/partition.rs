use crate::core::io::table::{MutationTable, TableError, chunk_path, write_table};
use crate::engine::config::PartitionConfig;
use csv::StringRecord;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("Input table '{0}' contains no mutations")]
    EmptyInput(String),
    #[error("Chunk count must be at least 1")]
    ZeroChunks,
    #[error("Cannot split {rows} mutations into {chunks} chunks")]
    TooManyChunks { rows: usize, chunks: usize },
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDir {
        path: String,
        source: std::io::Error,
    },
}

/// A contiguous slice of the cost-sorted workload, numbered from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub rows: Vec<StringRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSummary {
    pub index: usize,
    pub path: PathBuf,
    pub rows: usize,
    pub proteins: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionReport {
    pub total_rows: usize,
    pub total_proteins: usize,
    pub chunks: Vec<ChunkSummary>,
}

/// Splits a mutation table into `n` chunks of near-equal size, heaviest proteins first.
///
/// Rows are stably sorted by their protein's mutation count (descending) and protein id
/// (ascending), then cut into contiguous runs whose lengths differ by at most one. The
/// first `len % n` chunks carry the extra row.
pub fn partition(table: &MutationTable, n: usize) -> Result<Vec<Chunk>, PartitionError> {
    if n == 0 {
        return Err(PartitionError::ZeroChunks);
    }
    let total = table.len();
    if total == 0 {
        return Err(PartitionError::EmptyInput(String::new()));
    }
    if n > total {
        return Err(PartitionError::TooManyChunks {
            rows: total,
            chunks: n,
        });
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in table.rows() {
        *counts.entry(table.protein_id_of(row)).or_default() += 1;
    }

    let mut order: Vec<&StringRecord> = table.rows().iter().collect();
    order.sort_by(|a, b| {
        let (id_a, id_b) = (table.protein_id_of(a), table.protein_id_of(b));
        counts[id_b].cmp(&counts[id_a]).then_with(|| id_a.cmp(id_b))
    });

    let base = total / n;
    let extra = total % n;
    let mut chunks = Vec::with_capacity(n);
    let mut rows = order.into_iter();
    for i in 0..n {
        let size = base + usize::from(i < extra);
        chunks.push(Chunk {
            index: i + 1,
            rows: rows.by_ref().take(size).cloned().collect(),
        });
    }
    Ok(chunks)
}

/// Writes each chunk to `<dir>/<prefix>_<index>.csv` with the original header.
pub fn write_chunks(
    headers: &StringRecord,
    chunks: &[Chunk],
    dir: &Path,
    prefix: &str,
) -> Result<Vec<PathBuf>, PartitionError> {
    std::fs::create_dir_all(dir).map_err(|source| PartitionError::OutputDir {
        path: dir.to_string_lossy().to_string(),
        source,
    })?;
    chunks
        .iter()
        .map(|chunk| -> Result<PathBuf, PartitionError> {
            let path = chunk_path(dir, prefix, chunk.index);
            write_table(&path, headers, &chunk.rows)?;
            Ok(path)
        })
        .collect()
}

#[instrument(skip_all, name = "partition_workflow")]
pub fn split_file(config: &PartitionConfig) -> Result<PartitionReport, PartitionError> {
    let table = MutationTable::read(&config.input_file)?;
    info!(
        "Loaded {} mutations from {:?}; splitting into {} chunks.",
        table.len(),
        config.input_file,
        config.chunks
    );

    let chunks = partition(&table, config.chunks).map_err(|e| match e {
        PartitionError::EmptyInput(_) => {
            PartitionError::EmptyInput(config.input_file.to_string_lossy().to_string())
        }
        other => other,
    })?;
    let paths = write_chunks(
        table.headers(),
        &chunks,
        &config.output_dir,
        &config.chunk_prefix,
    )?;

    let summaries: Vec<ChunkSummary> = chunks
        .iter()
        .zip(paths)
        .map(|(chunk, path)| {
            let proteins: HashSet<&str> =
                chunk.rows.iter().map(|r| table.protein_id_of(r)).collect();
            info!(
                "Chunk {}: {} mutations across {} proteins -> {:?}",
                chunk.index,
                chunk.rows.len(),
                proteins.len(),
                path
            );
            ChunkSummary {
                index: chunk.index,
                path,
                rows: chunk.rows.len(),
                proteins: proteins.len(),
            }
        })
        .collect();

    let total_proteins = table
        .rows()
        .iter()
        .map(|r| table.protein_id_of(r))
        .collect::<HashSet<_>>()
        .len();
    Ok(PartitionReport {
        total_rows: table.len(),
        total_proteins,
        chunks: summaries,
    })
}
