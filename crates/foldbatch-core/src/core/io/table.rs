use crate::core::models::mutation::{KeyError, MutationKey, MutationRecord};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Column names shared by chunk files and result files.
pub mod columns {
    pub const PROTEIN_ID: &str = "UniProtID";
    pub const STRUCTURE_FILE: &str = "StructureFile";
    pub const WILD_TYPE: &str = "WildType";
    pub const POSITION: &str = "ResidueIndex";
    pub const MUTANT: &str = "MutantAA";
    pub const DDG: &str = "ddG";
    pub const MUTANT_STRUCTURE_FILE: &str = "MutantStructureFile";
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Table '{path}' is missing required column '{column}'")]
    MissingColumn { path: String, column: &'static str },
    #[error("Invalid row at line {line} of '{path}': {reason}")]
    InvalidRow {
        path: String,
        line: u64,
        reason: KeyError,
    },
}

/// Positions of the identifying columns within a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyColumns {
    pub protein_id: usize,
    pub wild_type: usize,
    pub position: usize,
    pub mutant: usize,
}

impl KeyColumns {
    /// Resolves the key columns, returning the name of the first one that is missing.
    pub fn resolve(headers: &StringRecord) -> Result<Self, &'static str> {
        Ok(Self {
            protein_id: find_column(headers, columns::PROTEIN_ID)?,
            wild_type: find_column(headers, columns::WILD_TYPE)?,
            position: find_column(headers, columns::POSITION)?,
            mutant: find_column(headers, columns::MUTANT)?,
        })
    }

    pub fn max_index(&self) -> usize {
        self.protein_id
            .max(self.wild_type)
            .max(self.position)
            .max(self.mutant)
    }

    pub fn key_of(&self, row: &StringRecord) -> Result<MutationKey, KeyError> {
        MutationKey::from_cells(
            row.get(self.protein_id).unwrap_or(""),
            row.get(self.wild_type).unwrap_or(""),
            row.get(self.position).unwrap_or(""),
            row.get(self.mutant).unwrap_or(""),
        )
    }
}

fn find_column(headers: &StringRecord, name: &'static str) -> Result<usize, &'static str> {
    headers.iter().position(|h| h.trim() == name).ok_or(name)
}

/// A filtered mutation table: a header row plus data rows with every column preserved.
#[derive(Debug, Clone)]
pub struct MutationTable {
    source: String,
    headers: StringRecord,
    key_columns: KeyColumns,
    structure_column: usize,
    rows: Vec<StringRecord>,
}

impl MutationTable {
    pub fn read(path: &Path) -> Result<Self, TableError> {
        let source = path.to_string_lossy().to_string();
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| TableError::Csv {
                path: source.clone(),
                source: e,
            })?;
        let headers = reader
            .headers()
            .map_err(|e| TableError::Csv {
                path: source.clone(),
                source: e,
            })?
            .clone();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| TableError::Csv {
                path: source.clone(),
                source: e,
            })?;
            rows.push(record);
        }
        Self::from_parts(source, headers, rows)
    }

    /// Builds a table from an in-memory header and rows; `source` labels error messages.
    pub fn from_parts(
        source: impl Into<String>,
        headers: StringRecord,
        rows: Vec<StringRecord>,
    ) -> Result<Self, TableError> {
        let source = source.into();
        let key_columns =
            KeyColumns::resolve(&headers).map_err(|column| TableError::MissingColumn {
                path: source.clone(),
                column,
            })?;
        let structure_column = find_column(&headers, columns::STRUCTURE_FILE).map_err(|column| {
            TableError::MissingColumn {
                path: source.clone(),
                column,
            }
        })?;
        Ok(Self {
            source,
            headers,
            key_columns,
            structure_column,
            rows,
        })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn protein_id_of<'r>(&self, row: &'r StringRecord) -> &'r str {
        row.get(self.key_columns.protein_id).unwrap_or("").trim()
    }

    /// Parses every row into a [`MutationRecord`].
    ///
    /// A row whose key cannot be built is an error. Repeated keys keep their first
    /// occurrence; later duplicates are dropped with a warning.
    pub fn records(&self) -> Result<Vec<MutationRecord>, TableError> {
        let mut seen = HashSet::with_capacity(self.rows.len());
        let mut records = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.iter().enumerate() {
            let key = self
                .key_columns
                .key_of(row)
                .map_err(|reason| TableError::InvalidRow {
                    path: self.source.clone(),
                    line: row_line(row, index),
                    reason,
                })?;
            if !seen.insert(key.clone()) {
                warn!(
                    "Duplicate mutation {} at line {} of '{}' ignored.",
                    key,
                    row_line(row, index),
                    self.source
                );
                continue;
            }
            records.push(MutationRecord {
                key,
                structure_file: row
                    .get(self.structure_column)
                    .unwrap_or("")
                    .trim()
                    .to_string(),
                row: row.clone(),
            });
        }
        Ok(records)
    }
}

fn row_line(row: &StringRecord, index: usize) -> u64 {
    row.position()
        .map(|p| p.line())
        .unwrap_or(index as u64 + 2)
}

/// Header of a result file: the input header followed by the energy and structure columns.
pub fn output_headers(input_headers: &StringRecord) -> StringRecord {
    let mut headers = input_headers.clone();
    headers.push_field(columns::DDG);
    headers.push_field(columns::MUTANT_STRUCTURE_FILE);
    headers
}

pub fn write_table(
    path: &Path,
    headers: &StringRecord,
    rows: &[StringRecord],
) -> Result<(), TableError> {
    let label = path.to_string_lossy().to_string();
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .map_err(|e| TableError::Csv {
            path: label.clone(),
            source: e,
        })?;
    writer.write_record(headers).map_err(|e| TableError::Csv {
        path: label.clone(),
        source: e,
    })?;
    for row in rows {
        writer.write_record(row).map_err(|e| TableError::Csv {
            path: label.clone(),
            source: e,
        })?;
    }
    writer.flush().map_err(|e| TableError::Io {
        path: label,
        source: e,
    })
}

pub fn chunk_path(dir: &Path, prefix: &str, index: usize) -> PathBuf {
    dir.join(format!("{}_{}.csv", prefix, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HEADER: &str = "Name,UniProtID,StructureFile,WildType,ResidueIndex,MutantAA,Class";

    fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("{}\n{}", HEADER, body)).unwrap();
        path
    }

    #[test]
    fn read_resolves_columns_and_builds_records() {
        let dir = tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "chunk.csv",
            "v1,P1,AF-P1-F1-model_v4.pdb,Glu,10,Asp,Pathogenic\n\
             v2,P1,AF-P1-F1-model_v4.pdb,Lys,55,Arg,Benign\n",
        );

        let table = MutationTable::read(&path).unwrap();
        assert_eq!(table.len(), 2);
        let records = table.records().unwrap();
        assert_eq!(records[0].key, MutationKey::new("P1", "Glu", 10, "Asp"));
        assert_eq!(records[0].structure_file, "AF-P1-F1-model_v4.pdb");
        assert_eq!(records[1].row.get(6), Some("Benign"));
        assert_eq!(table.protein_id_of(&records[1].row), "P1");
    }

    #[test]
    fn read_fails_when_a_required_column_is_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "UniProtID,WildType,ResidueIndex,MutantAA\nP1,Glu,10,Asp\n").unwrap();

        let result = MutationTable::read(&path);
        assert!(matches!(
            result,
            Err(TableError::MissingColumn {
                column: columns::STRUCTURE_FILE,
                ..
            })
        ));
    }

    #[test]
    fn read_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = MutationTable::read(&dir.path().join("absent.csv"));
        assert!(matches!(result, Err(TableError::Csv { .. })));
    }

    #[test]
    fn records_rejects_invalid_position_with_line_number() {
        let dir = tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "chunk.csv",
            "v1,P1,s.pdb,Glu,10,Asp,x\nv2,P1,s.pdb,Lys,abc,Arg,x\n",
        );

        let table = MutationTable::read(&path).unwrap();
        match table.records() {
            Err(TableError::InvalidRow { line, reason, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(reason, KeyError::InvalidPosition("abc".into()));
            }
            other => panic!("expected InvalidRow, got {:?}", other),
        }
    }

    #[test]
    fn records_drops_duplicate_keys_keeping_the_first() {
        let dir = tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "chunk.csv",
            "first,P1,s.pdb,Glu,10,Asp,x\nsecond,P1,s.pdb,Glu,10,Asp,y\n",
        );

        let records = MutationTable::read(&path).unwrap().records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].row.get(0), Some("first"));
    }

    #[test]
    fn write_table_preserves_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let headers = StringRecord::from(HEADER.split(',').collect::<Vec<_>>());
        let rows = vec![StringRecord::from(vec![
            "v1", "P1", "s.pdb", "Glu", "10", "Asp", "note, with comma",
        ])];

        write_table(&path, &headers, &rows).unwrap();

        let table = MutationTable::read(&path).unwrap();
        assert_eq!(table.headers(), &headers);
        assert_eq!(table.rows()[0].get(6), Some("note, with comma"));
    }

    #[test]
    fn output_headers_appends_result_columns() {
        let headers = StringRecord::from(vec!["UniProtID", "WildType"]);
        assert_eq!(
            output_headers(&headers),
            StringRecord::from(vec!["UniProtID", "WildType", "ddG", "MutantStructureFile"])
        );
    }

    #[test]
    fn chunk_path_is_one_based_and_prefixed() {
        assert_eq!(
            chunk_path(Path::new("/data"), "cohort_part", 3),
            PathBuf::from("/data/cohort_part_3.csv")
        );
    }
}
