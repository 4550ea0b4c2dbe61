//! Reconstruction of already-completed work from a worker's output file.
//!
//! The output file is the only durable state a worker has. On start-up it is scanned once
//! and every row's identity key is rebuilt from the persisted key columns, so that resumed
//! sessions never evaluate (and bill) a mutation twice.

use crate::core::io::table::KeyColumns;
use crate::core::models::mutation::MutationKey;
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("File I/O error for '{path}': {source}")]
    Io { path: String, source: io::Error },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error(
        "Output file '{path}' has no usable header (missing column '{column}'); it may have been cut off while the header was being written"
    )]
    MissingColumn { path: String, column: &'static str },
    #[error("Corrupt row at line {line} of '{path}': {reason}")]
    CorruptRow {
        path: String,
        line: u64,
        reason: String,
    },
}

/// Everything a worker needs to know about a previous session's output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorProgress {
    pub completed: HashSet<MutationKey>,
    /// Header of the existing output file; `None` when the file is absent or empty.
    pub header: Option<StringRecord>,
    pub rows: usize,
    /// Short rows left behind by interrupted appends whose key could not be trusted.
    pub ignored_torn_rows: usize,
    /// Short rows kept as completed because their key cells survived; their result cells may be cut.
    pub trusted_torn_rows: usize,
    /// The file did not end with a line terminator when it was opened.
    pub tail_was_torn: bool,
}

impl PriorProgress {
    pub fn is_fresh(&self) -> bool {
        self.header.is_none()
    }

    pub fn is_complete(&self, key: &MutationKey) -> bool {
        self.completed.contains(key)
    }
}

/// Source of the completed-key set for one worker.
pub trait ProgressLedger {
    fn load_prior_progress(&self) -> Result<PriorProgress, LedgerError>;
}

/// Ledger backed by the worker's append-only CSV output file.
#[derive(Debug, Clone)]
pub struct CsvLedger {
    path: PathBuf,
    repair_tail: bool,
}

impl CsvLedger {
    /// A ledger that repairs a torn tail in place before reading.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            repair_tail: true,
        }
    }

    /// A ledger that never writes to the file; a torn tail is only repaired in memory.
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            repair_tail: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn label(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn io_error(&self, source: io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.label(),
            source,
        }
    }

    fn read_contents(&self) -> Result<Option<Vec<u8>>, LedgerError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn append_to_file(&self, suffix: &[u8]) -> Result<(), LedgerError> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(suffix).map_err(|e| self.io_error(e))?;
        file.sync_data().map_err(|e| self.io_error(e))
    }

    fn reconstruct(&self, contents: &[u8]) -> Result<PriorProgress, LedgerError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(contents);
        let header = reader
            .headers()
            .map_err(|e| LedgerError::Csv {
                path: self.label(),
                source: e,
            })?
            .clone();
        let key_columns =
            KeyColumns::resolve(&header).map_err(|column| LedgerError::MissingColumn {
                path: self.label(),
                column,
            })?;
        let width = header.len();

        let mut progress = PriorProgress::default();
        for result in reader.records() {
            let row = result.map_err(|e| LedgerError::Csv {
                path: self.label(),
                source: e,
            })?;
            let line = row.position().map(|p| p.line()).unwrap_or(0);
            progress.rows += 1;

            if row.len() > width {
                return Err(LedgerError::CorruptRow {
                    path: self.label(),
                    line,
                    reason: format!("{} fields but the header has {}", row.len(), width),
                });
            }
            if row.len() == width {
                let key = key_columns
                    .key_of(&row)
                    .map_err(|reason| LedgerError::CorruptRow {
                        path: self.label(),
                        line,
                        reason: reason.to_string(),
                    })?;
                progress.completed.insert(key);
                continue;
            }

            match torn_row_key(&key_columns, &row) {
                Some(key) => {
                    warn!(
                        "Torn row at line {} of {:?} kept as completed mutation {}; its ddG may be truncated and its structure filename missing.",
                        line, self.path, key
                    );
                    progress.trusted_torn_rows += 1;
                    progress.completed.insert(key);
                }
                None => {
                    warn!(
                        "Ignoring torn row at line {} of {:?}; its mutation will be evaluated again.",
                        line, self.path
                    );
                    progress.ignored_torn_rows += 1;
                }
            }
        }
        progress.header = Some(header);
        Ok(progress)
    }
}

/// The key of a short row, if every key cell is present and none of them could have been cut.
fn torn_row_key(key_columns: &KeyColumns, row: &StringRecord) -> Option<MutationKey> {
    let last_cell = row.len().checked_sub(1)?;
    if key_columns.max_index() >= last_cell {
        return None;
    }
    key_columns.key_of(row).ok()
}

/// What must be appended to make `contents` end on a record boundary.
///
/// An odd number of quotes means the cut fell inside a quoted cell, possibly right after an
/// embedded line break, so the cell is closed even when the file already ends with `\n`.
fn tail_terminator(contents: &[u8]) -> Option<&'static [u8]> {
    let quotes = contents.iter().filter(|&&b| b == b'"').count();
    if quotes % 2 == 1 {
        Some(b"\"\n")
    } else if contents.ends_with(b"\n") {
        None
    } else {
        Some(b"\n")
    }
}

impl ProgressLedger for CsvLedger {
    fn load_prior_progress(&self) -> Result<PriorProgress, LedgerError> {
        let Some(mut contents) = self.read_contents()? else {
            debug!("No prior output at {:?}; starting a fresh ledger.", self.path);
            return Ok(PriorProgress::default());
        };
        if contents.is_empty() {
            debug!("Prior output {:?} is empty; starting a fresh ledger.", self.path);
            return Ok(PriorProgress::default());
        }

        let mut tail_was_torn = false;
        if let Some(terminator) = tail_terminator(&contents) {
            tail_was_torn = true;
            if self.repair_tail {
                warn!(
                    "Output file {:?} ends mid-record (interrupted write); appending a terminator.",
                    self.path
                );
                self.append_to_file(terminator)?;
            }
            contents.extend_from_slice(terminator);
        }

        let mut progress = self.reconstruct(&contents)?;
        progress.tail_was_torn = tail_was_torn;
        info!(
            "Ledger {:?}: {} completed mutations from {} rows.",
            self.path,
            progress.completed.len(),
            progress.rows
        );
        Ok(progress)
    }
}
