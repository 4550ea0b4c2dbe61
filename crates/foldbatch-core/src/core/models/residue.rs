use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AminoAcid {
    // --- Aliphatic, Nonpolar ---
    Alanine,    // ALA / A
    Glycine,    // GLY / G
    Isoleucine, // ILE / I
    Leucine,    // LEU / L
    Proline,    // PRO / P
    Valine,     // VAL / V

    // --- Aromatic ---
    Phenylalanine, // PHE / F
    Tryptophan,    // TRP / W
    Tyrosine,      // TYR / Y

    // --- Polar, Uncharged ---
    Asparagine, // ASN / N
    Cysteine,   // CYS / C
    Glutamine,  // GLN / Q
    Serine,     // SER / S
    Threonine,  // THR / T
    Methionine, // MET / M

    // --- Positively Charged (Basic) ---
    Arginine,  // ARG / R
    Histidine, // HIS / H
    Lysine,    // LYS / K

    // --- Negatively Charged (Acidic) ---
    AsparticAcid, // ASP / D
    GlutamicAcid, // GLU / E

    // --- Non-standard, genetically encoded ---
    Selenocysteine, // SEC / U
    Pyrrolysine,    // PYL / O
}

static THREE_LETTER_CODES: Map<&'static str, AminoAcid> = phf_map! {
    "ALA" => AminoAcid::Alanine,
    "GLY" => AminoAcid::Glycine,
    "ILE" => AminoAcid::Isoleucine,
    "LEU" => AminoAcid::Leucine,
    "PRO" => AminoAcid::Proline,
    "VAL" => AminoAcid::Valine,
    "PHE" => AminoAcid::Phenylalanine,
    "TRP" => AminoAcid::Tryptophan,
    "TYR" => AminoAcid::Tyrosine,
    "ASN" => AminoAcid::Asparagine,
    "CYS" => AminoAcid::Cysteine,
    "GLN" => AminoAcid::Glutamine,
    "SER" => AminoAcid::Serine,
    "THR" => AminoAcid::Threonine,
    "MET" => AminoAcid::Methionine,
    "ARG" => AminoAcid::Arginine,
    "HIS" => AminoAcid::Histidine,
    "LYS" => AminoAcid::Lysine,
    "ASP" => AminoAcid::AsparticAcid,
    "GLU" => AminoAcid::GlutamicAcid,
    "SEC" => AminoAcid::Selenocysteine,
    "PYL" => AminoAcid::Pyrrolysine,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown three-letter residue code: '{0}'")]
pub struct UnknownResidueCode(pub String);

impl AminoAcid {
    /// Looks up a three-letter residue code, ignoring case and surrounding whitespace.
    pub fn from_three_letter(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.len() != 3 {
            return None;
        }
        THREE_LETTER_CODES
            .get(code.to_ascii_uppercase().as_str())
            .copied()
    }

    pub fn three_letter(self) -> &'static str {
        match self {
            AminoAcid::Alanine => "ALA",
            AminoAcid::Glycine => "GLY",
            AminoAcid::Isoleucine => "ILE",
            AminoAcid::Leucine => "LEU",
            AminoAcid::Proline => "PRO",
            AminoAcid::Valine => "VAL",
            AminoAcid::Phenylalanine => "PHE",
            AminoAcid::Tryptophan => "TRP",
            AminoAcid::Tyrosine => "TYR",
            AminoAcid::Asparagine => "ASN",
            AminoAcid::Cysteine => "CYS",
            AminoAcid::Glutamine => "GLN",
            AminoAcid::Serine => "SER",
            AminoAcid::Threonine => "THR",
            AminoAcid::Methionine => "MET",
            AminoAcid::Arginine => "ARG",
            AminoAcid::Histidine => "HIS",
            AminoAcid::Lysine => "LYS",
            AminoAcid::AsparticAcid => "ASP",
            AminoAcid::GlutamicAcid => "GLU",
            AminoAcid::Selenocysteine => "SEC",
            AminoAcid::Pyrrolysine => "PYL",
        }
    }

    pub fn one_letter(self) -> char {
        match self {
            AminoAcid::Alanine => 'A',
            AminoAcid::Glycine => 'G',
            AminoAcid::Isoleucine => 'I',
            AminoAcid::Leucine => 'L',
            AminoAcid::Proline => 'P',
            AminoAcid::Valine => 'V',
            AminoAcid::Phenylalanine => 'F',
            AminoAcid::Tryptophan => 'W',
            AminoAcid::Tyrosine => 'Y',
            AminoAcid::Asparagine => 'N',
            AminoAcid::Cysteine => 'C',
            AminoAcid::Glutamine => 'Q',
            AminoAcid::Serine => 'S',
            AminoAcid::Threonine => 'T',
            AminoAcid::Methionine => 'M',
            AminoAcid::Arginine => 'R',
            AminoAcid::Histidine => 'H',
            AminoAcid::Lysine => 'K',
            AminoAcid::AsparticAcid => 'D',
            AminoAcid::GlutamicAcid => 'E',
            AminoAcid::Selenocysteine => 'U',
            AminoAcid::Pyrrolysine => 'O',
        }
    }
}

impl FromStr for AminoAcid {
    type Err = UnknownResidueCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_three_letter(s).ok_or_else(|| UnknownResidueCode(s.trim().to_string()))
    }
}

impl fmt::Display for AminoAcid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.three_letter())
    }
}
