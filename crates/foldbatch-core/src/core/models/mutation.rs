use super::residue::{AminoAcid, UnknownResidueCode};
use csv::StringRecord;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Protein identifier is empty")]
    EmptyProtein,
    #[error("Residue code in column '{0}' is empty")]
    EmptyResidue(&'static str),
    #[error("Invalid residue position '{0}' (expected a positive integer)")]
    InvalidPosition(String),
}

/// The identity of a mutation within a partition.
///
/// Residue codes are kept exactly as persisted (trimmed, case preserved) so that a key
/// rebuilt from an output row is equal to the key built from the matching input row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationKey {
    pub protein_id: String,
    pub wild_type: String,
    pub position: u32,
    pub mutant: String,
}

impl MutationKey {
    pub fn new(protein_id: &str, wild_type: &str, position: u32, mutant: &str) -> Self {
        Self {
            protein_id: protein_id.trim().to_string(),
            wild_type: wild_type.trim().to_string(),
            position,
            mutant: mutant.trim().to_string(),
        }
    }

    /// Builds a key from the four raw table cells that identify a mutation.
    pub fn from_cells(
        protein_id: &str,
        wild_type: &str,
        position: &str,
        mutant: &str,
    ) -> Result<Self, KeyError> {
        if protein_id.trim().is_empty() {
            return Err(KeyError::EmptyProtein);
        }
        if wild_type.trim().is_empty() {
            return Err(KeyError::EmptyResidue("wild-type"));
        }
        if mutant.trim().is_empty() {
            return Err(KeyError::EmptyResidue("mutant"));
        }
        let position =
            parse_position(position).ok_or_else(|| KeyError::InvalidPosition(position.into()))?;
        Ok(Self::new(protein_id, wild_type, position, mutant))
    }
}

impl fmt::Display for MutationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}{}{}",
            self.protein_id, self.wild_type, self.position, self.mutant
        )
    }
}

/// Parses a 1-based residue position.
///
/// Float-formatted integers (`"10.0"`) are accepted when the fractional part is all zeros,
/// since upstream table tooling sometimes writes integer columns that way.
pub fn parse_position(cell: &str) -> Option<u32> {
    let cell = cell.trim();
    let integral = match cell.split_once('.') {
        Some((int_part, frac)) if !frac.is_empty() && frac.bytes().all(|b| b == b'0') => {
            int_part
        }
        Some(_) => return None,
        None => cell,
    };
    if integral.is_empty() || !integral.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    integral.parse::<u32>().ok().filter(|&p| p > 0)
}

/// A point mutation expressed in one-letter residue codes, e.g. `E10D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationCode {
    pub wild_type: AminoAcid,
    pub position: u32,
    pub mutant: AminoAcid,
}

impl MutationCode {
    /// The engine's mutation-description token: wild type, chain, position, mutant (`EA10D`).
    pub fn engine_token(&self, chain_id: char) -> String {
        format!(
            "{}{}{}{}",
            self.wild_type.one_letter(),
            chain_id,
            self.position,
            self.mutant.one_letter()
        )
    }
}

impl fmt::Display for MutationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.wild_type.one_letter(),
            self.position,
            self.mutant.one_letter()
        )
    }
}

/// One row of a work chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub key: MutationKey,
    pub structure_file: String,
    /// The full input row, passthrough columns included.
    pub row: StringRecord,
}

impl MutationRecord {
    pub fn protein_id(&self) -> &str {
        &self.key.protein_id
    }

    pub fn mutation_code(&self) -> Result<MutationCode, UnknownResidueCode> {
        Ok(MutationCode {
            wild_type: self.key.wild_type.parse()?,
            position: self.key.position,
            mutant: self.key.mutant.parse()?,
        })
    }
}

/// A completed evaluation, ready to be appended to a worker's output file.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub row: StringRecord,
    pub ddg: Option<f64>,
    pub mutant_structure_file: String,
}

impl ResultRecord {
    pub fn new(record: &MutationRecord, ddg: Option<f64>, mutant_structure_file: String) -> Self {
        Self {
            row: record.row.clone(),
            ddg,
            mutant_structure_file,
        }
    }

    /// The input cells followed by the energy (empty when absent) and the structure filename.
    pub fn to_output_row(&self) -> StringRecord {
        let mut out = self.row.clone();
        match self.ddg {
            Some(value) => out.push_field(&value.to_string()),
            None => out.push_field(""),
        }
        out.push_field(&self.mutant_structure_file);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_position_accepts_plain_and_float_formatted_integers() {
        assert_eq!(parse_position("10"), Some(10));
        assert_eq!(parse_position(" 55 "), Some(55));
        assert_eq!(parse_position("10.0"), Some(10));
        assert_eq!(parse_position("7.000"), Some(7));
    }

    #[test]
    fn parse_position_rejects_non_positive_fractional_and_garbage() {
        assert_eq!(parse_position("0"), None);
        assert_eq!(parse_position("-3"), None);
        assert_eq!(parse_position("10.5"), None);
        assert_eq!(parse_position("10."), None);
        assert_eq!(parse_position(""), None);
        assert_eq!(parse_position("1e3"), None);
        assert_eq!(parse_position("+4"), None);
    }

    #[test]
    fn from_cells_builds_identical_keys_from_equivalent_cells() {
        let a = MutationKey::from_cells("P1", "Glu", "10", "Asp").unwrap();
        let b = MutationKey::from_cells(" P1", "Glu ", "10.0", "Asp").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "P1_Glu10Asp");
    }

    #[test]
    fn from_cells_reports_which_cell_is_invalid() {
        assert_eq!(
            MutationKey::from_cells("", "Glu", "10", "Asp"),
            Err(KeyError::EmptyProtein)
        );
        assert_eq!(
            MutationKey::from_cells("P1", "Glu", "x", "Asp"),
            Err(KeyError::InvalidPosition("x".into()))
        );
        assert_eq!(
            MutationKey::from_cells("P1", "Glu", "3", " "),
            Err(KeyError::EmptyResidue("mutant"))
        );
    }

    #[test]
    fn mutation_code_formats_short_code_and_engine_token() {
        let record = MutationRecord {
            key: MutationKey::new("P1", "Glu", 10, "Asp"),
            structure_file: "AF-P1-F1-model_v4.pdb".into(),
            row: StringRecord::new(),
        };
        let code = record.mutation_code().unwrap();
        assert_eq!(code.to_string(), "E10D");
        assert_eq!(code.engine_token('A'), "EA10D");
    }

    #[test]
    fn mutation_code_fails_for_unknown_residue() {
        let record = MutationRecord {
            key: MutationKey::new("P1", "Glu", 10, "Ter"),
            structure_file: String::new(),
            row: StringRecord::new(),
        };
        assert_eq!(
            record.mutation_code(),
            Err(UnknownResidueCode("Ter".to_string()))
        );
    }

    #[test]
    fn result_record_appends_energy_and_structure_columns() {
        let row = StringRecord::from(vec!["P1", "Glu", "10", "Asp"]);
        let with_energy = ResultRecord {
            row: row.clone(),
            ddg: Some(1.25),
            mutant_structure_file: "P1_E10D.pdb".into(),
        };
        assert_eq!(
            with_energy.to_output_row(),
            StringRecord::from(vec!["P1", "Glu", "10", "Asp", "1.25", "P1_E10D.pdb"])
        );

        let without_energy = ResultRecord {
            row,
            ddg: None,
            mutant_structure_file: "P1_E10D.pdb".into(),
        };
        assert_eq!(without_energy.to_output_row().get(4), Some(""));
    }
}
