use super::error::PipelineError;
use super::ledger::PriorProgress;
use crate::core::models::mutation::ResultRecord;
use csv::{StringRecord, WriterBuilder};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Appends completed results to a worker's output file, one protein group at a time.
///
/// Each append is a single `write_all` followed by `sync_data`, so an interrupted worker
/// loses at most the group it was working on.
#[derive(Debug)]
pub struct CheckpointWriter {
    path: PathBuf,
    header: StringRecord,
    write_header: bool,
}

impl CheckpointWriter {
    /// Fails if an existing output file was written with a different header.
    pub fn new(
        path: impl Into<PathBuf>,
        header: StringRecord,
        prior: &PriorProgress,
    ) -> Result<Self, PipelineError> {
        let path = path.into();
        if let Some(existing) = &prior.header {
            if !same_columns(existing, &header) {
                return Err(PipelineError::SchemaMismatch {
                    path: path.to_string_lossy().to_string(),
                    expected: join(&header),
                    found: join(existing),
                });
            }
        }
        Ok(Self {
            path,
            header,
            write_header: prior.is_fresh(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably appends `results`, returning how many rows were written.
    pub fn append(&mut self, results: &[ResultRecord]) -> Result<usize, PipelineError> {
        if results.is_empty() {
            return Ok(0);
        }
        let buffer = self
            .encode(results)
            .map_err(|source| self.checkpoint_error(source))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.checkpoint_error(source))?;
        file.write_all(&buffer)
            .and_then(|_| file.sync_data())
            .map_err(|source| self.checkpoint_error(source))?;

        self.write_header = false;
        debug!(
            "Checkpointed {} results ({} bytes) to {:?}",
            results.len(),
            buffer.len(),
            self.path
        );
        Ok(results.len())
    }

    fn encode(&self, results: &[ResultRecord]) -> io::Result<Vec<u8>> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if self.write_header {
            writer.write_record(&self.header)?;
        }
        for result in results {
            writer.write_record(&result.to_output_row())?;
        }
        writer.into_inner().map_err(|e| e.into_error())
    }

    fn checkpoint_error(&self, source: io::Error) -> PipelineError {
        PipelineError::Checkpoint {
            path: self.path.to_string_lossy().to_string(),
            source,
        }
    }
}

fn same_columns(a: &StringRecord, b: &StringRecord) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.trim() == y.trim())
}

fn join(record: &StringRecord) -> String {
    record.iter().collect::<Vec<_>>().join(",")
}
