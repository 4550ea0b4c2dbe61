use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("File I/O error for '{path}': {source}")]
    Io { path: String, source: io::Error },
    #[error("Unsupported structure format: '{0}'")]
    UnsupportedFormat(String),
    #[error("No _atom_site loop found in '{0}'")]
    MissingAtomSite(String),
    #[error("Malformed structure record in '{path}': {reason}")]
    Malformed { path: String, reason: String },
    #[error("No atoms found for chain '{chain}' in '{path}'")]
    EmptyChain { path: String, chain: char },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    Pdb,
    Mmcif,
}

impl StructureFormat {
    /// Detects the format from a filename, returning whether the file is gzip-compressed.
    pub fn detect(path: &Path) -> Option<(Self, bool)> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        let (stem, compressed) = match name.strip_suffix(".gz") {
            Some(stem) => (stem, true),
            None => (name.as_str(), false),
        };
        if stem.ends_with(".pdb") || stem.ends_with(".ent") {
            Some((StructureFormat::Pdb, compressed))
        } else if stem.ends_with(".cif") || stem.ends_with(".mmcif") {
            Some((StructureFormat::Mmcif, compressed))
        } else {
            None
        }
    }
}

/// Produces the engine's PDB input from an upstream structure file.
pub trait StructureConverter {
    /// Writes the converted structure to `destination`, returning the number of atoms written.
    fn convert(&self, source: &Path, destination: &Path) -> Result<usize, ConversionError>;
}

/// Keeps only the primary chain of the first model and writes it as PDB records.
///
/// This is a record-level transcription: coordinates, names, and numbering are carried over
/// verbatim and no structural model is built.
#[derive(Debug, Clone, Copy)]
pub struct PrimaryChainConverter {
    chain: char,
}

impl PrimaryChainConverter {
    pub fn new(chain: char) -> Self {
        Self { chain }
    }

    fn open(source: &Path, compressed: bool) -> Result<Box<dyn BufRead>, ConversionError> {
        let file = File::open(source).map_err(|e| io_error(source, e))?;
        let reader: Box<dyn Read> = if compressed {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(Box::new(BufReader::new(reader)))
    }

    fn pdb_atoms(&self, source: &Path, reader: Box<dyn BufRead>) -> Result<Vec<String>, ConversionError> {
        let mut atoms = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| io_error(source, e))?;
            if line.starts_with("ENDMDL") {
                break;
            }
            if (line.starts_with("ATOM") || line.starts_with("HETATM"))
                && line.chars().nth(21) == Some(self.chain)
            {
                atoms.push(line.trim_end().to_string());
            }
        }
        Ok(atoms)
    }

    fn mmcif_atoms(&self, source: &Path, reader: Box<dyn BufRead>) -> Result<Vec<String>, ConversionError> {
        let label = source.to_string_lossy().to_string();
        let table = AtomSiteTable::read(reader).map_err(|e| io_error(source, e))?;
        let table = table.ok_or_else(|| ConversionError::MissingAtomSite(label.clone()))?;
        let columns = AtomSiteColumns::resolve(&table.fields).ok_or_else(|| {
            ConversionError::Malformed {
                path: label.clone(),
                reason: "_atom_site loop lacks coordinate or naming fields".to_string(),
            }
        })?;
        if table.values.len() % table.fields.len() != 0 {
            return Err(ConversionError::Malformed {
                path: label,
                reason: format!(
                    "{} values do not fill rows of {} fields",
                    table.values.len(),
                    table.fields.len()
                ),
            });
        }

        let mut atoms = Vec::new();
        let mut first_model: Option<&str> = None;
        for row in table.values.chunks(table.fields.len()) {
            if let Some(model_col) = columns.model {
                let model = row[model_col].as_str();
                match first_model {
                    None => first_model = Some(model),
                    Some(first) if first != model => break,
                    Some(_) => {}
                }
            }
            let chain = row[columns.chain].as_str();
            if chain.chars().next() != Some(self.chain) || chain.len() != 1 {
                continue;
            }
            let line = columns
                .format_record(row, atoms.len() + 1)
                .map_err(|reason| ConversionError::Malformed {
                    path: label.clone(),
                    reason,
                })?;
            atoms.push(line);
        }
        Ok(atoms)
    }
}

impl StructureConverter for PrimaryChainConverter {
    fn convert(&self, source: &Path, destination: &Path) -> Result<usize, ConversionError> {
        let (format, compressed) = StructureFormat::detect(source)
            .ok_or_else(|| ConversionError::UnsupportedFormat(source.to_string_lossy().into()))?;
        let reader = Self::open(source, compressed)?;
        let atoms = match format {
            StructureFormat::Pdb => self.pdb_atoms(source, reader)?,
            StructureFormat::Mmcif => self.mmcif_atoms(source, reader)?,
        };
        if atoms.is_empty() {
            return Err(ConversionError::EmptyChain {
                path: source.to_string_lossy().into(),
                chain: self.chain,
            });
        }

        let file = File::create(destination).map_err(|e| io_error(destination, e))?;
        let mut writer = BufWriter::new(file);
        let write = |writer: &mut BufWriter<File>| -> io::Result<()> {
            for atom in &atoms {
                writeln!(writer, "{}", atom)?;
            }
            writeln!(writer, "TER")?;
            writeln!(writer, "END")?;
            writer.flush()
        };
        write(&mut writer).map_err(|e| io_error(destination, e))?;
        debug!(
            "Converted {:?} -> {:?} ({} atoms, chain {})",
            source,
            destination,
            atoms.len(),
            self.chain
        );
        Ok(atoms.len())
    }
}

fn io_error(path: &Path, source: io::Error) -> ConversionError {
    ConversionError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

struct AtomSiteTable {
    fields: Vec<String>,
    values: Vec<String>,
}

impl AtomSiteTable {
    /// Collects the field names and the flattened values of the `_atom_site` loop.
    fn read(reader: Box<dyn BufRead>) -> io::Result<Option<Self>> {
        let mut fields = Vec::new();
        let mut values = Vec::new();
        let mut in_loop = false;
        let mut in_values = false;

        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if in_values {
                if trimmed.starts_with('_')
                    || trimmed.starts_with("loop_")
                    || trimmed.starts_with("data_")
                    || trimmed.starts_with('#')
                {
                    break;
                }
                values.extend(tokenize(trimmed));
                continue;
            }
            if trimmed == "loop_" {
                in_loop = true;
                fields.clear();
                continue;
            }
            if in_loop {
                if let Some(field) = trimmed.strip_prefix("_atom_site.") {
                    fields.push(field.to_string());
                    continue;
                }
                if !fields.is_empty() && !trimmed.is_empty() && !trimmed.starts_with('_') {
                    in_values = true;
                    values.extend(tokenize(trimmed));
                    continue;
                }
                if !fields.is_empty() || trimmed.starts_with('_') {
                    in_loop = false;
                }
            }
        }

        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self { fields, values }))
    }
}

/// Splits one line of a CIF loop into tokens, honoring single and double quotes.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        if chars[i] == '\'' || chars[i] == '"' {
            let quote = chars[i];
            let start = i + 1;
            let mut end = start;
            // A quote only closes a token when followed by whitespace or the end of line.
            while end < chars.len()
                && !(chars[end] == quote
                    && (end + 1 == chars.len() || chars[end + 1].is_whitespace()))
            {
                end += 1;
            }
            tokens.push(chars[start..end.min(chars.len())].iter().collect());
            i = end + 1;
        } else {
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
        }
    }
    tokens
}

struct AtomSiteColumns {
    group: Option<usize>,
    element: Option<usize>,
    atom_name: usize,
    alt_loc: Option<usize>,
    residue_name: usize,
    chain: usize,
    residue_number: usize,
    insertion_code: Option<usize>,
    x: usize,
    y: usize,
    z: usize,
    occupancy: Option<usize>,
    b_factor: Option<usize>,
    model: Option<usize>,
}

impl AtomSiteColumns {
    fn resolve(fields: &[String]) -> Option<Self> {
        let find = |name: &str| fields.iter().position(|f| f == name);
        let either = |primary: &str, fallback: &str| find(primary).or_else(|| find(fallback));
        Some(Self {
            group: find("group_PDB"),
            element: find("type_symbol"),
            atom_name: either("auth_atom_id", "label_atom_id")?,
            alt_loc: find("label_alt_id"),
            residue_name: either("auth_comp_id", "label_comp_id")?,
            chain: either("auth_asym_id", "label_asym_id")?,
            residue_number: either("auth_seq_id", "label_seq_id")?,
            insertion_code: find("pdbx_PDB_ins_code"),
            x: find("Cartn_x")?,
            y: find("Cartn_y")?,
            z: find("Cartn_z")?,
            occupancy: find("occupancy"),
            b_factor: find("B_iso_or_equiv"),
            model: find("pdbx_PDB_model_num"),
        })
    }

    fn format_record(&self, row: &[String], serial: usize) -> Result<String, String> {
        let cell = |idx: Option<usize>| -> &str {
            idx.map(|i| row[i].as_str())
                .filter(|v| *v != "." && *v != "?")
                .unwrap_or("")
        };
        let number = |idx: usize, what: &str| -> Result<f64, String> {
            row[idx]
                .parse::<f64>()
                .map_err(|_| format!("invalid {} value '{}'", what, row[idx]))
        };
        let optional_number = |idx: Option<usize>, default: f64| -> f64 {
            let value = cell(idx);
            if value.is_empty() {
                default
            } else {
                value.parse().unwrap_or(default)
            }
        };

        let record = if cell(self.group) == "HETATM" {
            "HETATM"
        } else {
            "ATOM"
        };
        let name = row[self.atom_name].as_str();
        let element = cell(self.element);
        let padded_name = if name.len() < 4 && element.len() < 2 {
            format!(" {:<3}", name)
        } else {
            format!("{:<4}", name)
        };
        let residue_number: i64 = row[self.residue_number]
            .parse()
            .map_err(|_| format!("invalid residue number '{}'", row[self.residue_number]))?;

        Ok(format!(
            "{:<6}{:>5} {}{:1}{:>3} {:1}{:>4}{:1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
            record,
            serial % 100_000,
            padded_name,
            first_char(cell(self.alt_loc)),
            row[self.residue_name],
            first_char(&row[self.chain]),
            residue_number,
            first_char(cell(self.insertion_code)),
            number(self.x, "Cartn_x")?,
            number(self.y, "Cartn_y")?,
            number(self.z, "Cartn_z")?,
            optional_number(self.occupancy, 1.0),
            optional_number(self.b_factor, 0.0),
            element,
        ))
    }
}

fn first_char(value: &str) -> String {
    value.chars().next().map(String::from).unwrap_or_default()
}

/// Finds upstream structure files named `<prefix>-<protein-id>-<version>-model...`.
#[derive(Debug, Clone)]
pub struct StructureLocator {
    directory: PathBuf,
}

impl StructureLocator {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the structure for a protein: the recorded file when present, otherwise the
    /// best match found by scanning the directory.
    pub fn resolve(&self, protein_id: &str, recorded: &str) -> Option<PathBuf> {
        if !recorded.is_empty() {
            let path = self.directory.join(recorded);
            if path.is_file() {
                return Some(path);
            }
            debug!(
                "Recorded structure {:?} for {} not found; scanning {:?}",
                path, protein_id, self.directory
            );
        }
        self.scan(protein_id)
    }

    fn scan(&self, protein_id: &str) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.directory).ok()?;
        let mut candidates: Vec<(StructureFormat, String)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| protein_id_from_filename(name) == Some(protein_id))
            .filter_map(|name| {
                StructureFormat::detect(Path::new(&name)).map(|(format, _)| (format, name))
            })
            .collect();
        // PDB is the engine's native format and wins over mmCIF; names break ties.
        candidates.sort_by(|a, b| {
            let rank = |f: StructureFormat| matches!(f, StructureFormat::Mmcif) as u8;
            rank(a.0).cmp(&rank(b.0)).then_with(|| a.1.cmp(&b.1))
        });
        candidates
            .into_iter()
            .next()
            .map(|(_, name)| self.directory.join(name))
    }
}

/// Extracts the protein identifier from an upstream filename such as
/// `AF-P12345-F1-model_v4.cif.gz`.
pub fn protein_id_from_filename(name: &str) -> Option<&str> {
    if !name.contains("model") {
        return None;
    }
    let mut parts = name.split('-');
    let _prefix = parts.next().filter(|p| !p.is_empty())?;
    let id = parts.next().filter(|p| !p.is_empty())?;
    parts.next()?;
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::tempdir;

    const PDB: &str = "\
HEADER    PREDICTED MODEL
ATOM      1  N   MET A   1      -1.000   2.000   3.000  1.00 91.50           N
ATOM      2  CA  MET A   1      -1.500   2.500   3.500  1.00 92.00           C
ATOM      3  N   GLY B   1       4.000   5.000   6.000  1.00 80.00           N
HETATM    4 ZN    ZN A 101       7.000   8.000   9.000  1.00 50.00          ZN
TER
END
";

    const CIF: &str = "\
data_AF-P1-F1
#
loop_
_atom_site.group_PDB
_atom_site.id
_atom_site.type_symbol
_atom_site.label_atom_id
_atom_site.label_alt_id
_atom_site.label_comp_id
_atom_site.label_asym_id
_atom_site.label_seq_id
_atom_site.pdbx_PDB_ins_code
_atom_site.Cartn_x
_atom_site.Cartn_y
_atom_site.Cartn_z
_atom_site.occupancy
_atom_site.B_iso_or_equiv
_atom_site.auth_seq_id
_atom_site.auth_asym_id
_atom_site.pdbx_PDB_model_num
ATOM 1 N N . MET A 1 ? -1.000 2.000 3.000 1.00 91.50 1 A 1
ATOM 2 C CA . MET A 1 ? -1.500 2.500 3.500 1.00 92.00 1 A 1
ATOM 3 N N . GLY B 1 ? 4.000 5.000 6.000 1.00 80.00 1 B 1
ATOM 4 C \"C5'\" . DA A 2 ? 1.000 1.000 1.000 1.00 70.00 2 A 1
#
";

    #[test]
    fn detect_recognizes_formats_and_compression() {
        assert_eq!(
            StructureFormat::detect(Path::new("AF-P1-F1-model_v4.pdb")),
            Some((StructureFormat::Pdb, false))
        );
        assert_eq!(
            StructureFormat::detect(Path::new("AF-P1-F1-model_v4.cif.gz")),
            Some((StructureFormat::Mmcif, true))
        );
        assert_eq!(StructureFormat::detect(Path::new("notes.txt")), None);
    }

    #[test]
    fn pdb_conversion_keeps_only_primary_chain() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("AF-P1-F1-model_v4.pdb");
        let dest = dir.path().join("P1.pdb");
        fs::write(&source, PDB).unwrap();

        let written = PrimaryChainConverter::new('A').convert(&source, &dest).unwrap();

        assert_eq!(written, 3);
        let out = fs::read_to_string(&dest).unwrap();
        assert!(out.contains("MET A   1"));
        assert!(out.contains("ZN A 101"));
        assert!(!out.contains("GLY B"));
        assert!(out.trim_end().ends_with("END"));
    }

    #[test]
    fn gzipped_pdb_is_decompressed() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("AF-P1-F1-model_v4.pdb.gz");
        let mut encoder = GzEncoder::new(File::create(&source).unwrap(), Compression::default());
        encoder.write_all(PDB.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let dest = dir.path().join("P1.pdb");
        let written = PrimaryChainConverter::new('A').convert(&source, &dest).unwrap();
        assert_eq!(written, 3);
    }

    #[test]
    fn only_first_model_is_kept() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("multi.pdb");
        let atom = "ATOM      1  CA  MET A   1      -1.500   2.500   3.500  1.00 92.00           C";
        fs::write(
            &source,
            format!("MODEL        1\n{}\nENDMDL\nMODEL        2\n{}\nENDMDL\n", atom, atom),
        )
        .unwrap();
        let written = PrimaryChainConverter::new('A')
            .convert(&source, &dir.path().join("out.pdb"))
            .unwrap();
        assert_eq!(written, 1);
    }

    #[test]
    fn mmcif_conversion_writes_fixed_column_records() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("AF-P1-F1-model_v4.cif");
        let dest = dir.path().join("P1.pdb");
        fs::write(&source, CIF).unwrap();

        let written = PrimaryChainConverter::new('A').convert(&source, &dest).unwrap();
        assert_eq!(written, 3);

        let out = fs::read_to_string(&dest).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            "ATOM      1  N   MET A   1      -1.000   2.000   3.000  1.00 91.50           N"
        );
        assert_eq!(&lines[1][12..16], " CA ");
        assert_eq!(&lines[2][12..16], " C5'");
        assert!(lines.iter().all(|l| !l.starts_with("ATOM") || &l[21..22] == "A"));
        assert_eq!(lines[3], "TER");
    }

    #[test]
    fn missing_chain_is_an_error() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("x.pdb");
        fs::write(&source, PDB).unwrap();
        let result = PrimaryChainConverter::new('C').convert(&source, &dir.path().join("o.pdb"));
        assert!(matches!(result, Err(ConversionError::EmptyChain { chain: 'C', .. })));
    }

    #[test]
    fn cif_without_atom_site_is_an_error() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("x.cif");
        fs::write(&source, "data_x\n_entry.id x\n").unwrap();
        let result = PrimaryChainConverter::new('A').convert(&source, &dir.path().join("o.pdb"));
        assert!(matches!(result, Err(ConversionError::MissingAtomSite(_))));
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("x.xyz");
        fs::write(&source, "").unwrap();
        let result = PrimaryChainConverter::new('A').convert(&source, &dir.path().join("o.pdb"));
        assert!(matches!(result, Err(ConversionError::UnsupportedFormat(_))));
    }

    #[test]
    fn tokenize_honors_quotes() {
        assert_eq!(
            tokenize("ATOM 1 \"C5'\" 'a b' x"),
            vec!["ATOM", "1", "C5'", "a b", "x"]
        );
    }

    #[test]
    fn protein_id_is_the_second_dash_field() {
        assert_eq!(
            protein_id_from_filename("AF-P12345-F1-model_v4.cif.gz"),
            Some("P12345")
        );
        assert_eq!(protein_id_from_filename("AF-P12345-F1.cif"), None);
        assert_eq!(protein_id_from_filename("model.pdb"), None);
    }

    #[test]
    fn locator_prefers_recorded_file_then_pdb_over_cif() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("AF-P1-F1-model_v4.cif.gz"), "").unwrap();
        fs::write(dir.path().join("AF-P1-F1-model_v4.pdb.gz"), "").unwrap();
        fs::write(dir.path().join("AF-P2-F1-model_v4.cif"), "").unwrap();
        let locator = StructureLocator::new(dir.path());

        assert_eq!(
            locator.resolve("P1", "AF-P1-F1-model_v4.cif.gz"),
            Some(dir.path().join("AF-P1-F1-model_v4.cif.gz"))
        );
        assert_eq!(
            locator.resolve("P1", "missing.cif"),
            Some(dir.path().join("AF-P1-F1-model_v4.pdb.gz"))
        );
        assert_eq!(
            locator.resolve("P2", ""),
            Some(dir.path().join("AF-P2-F1-model_v4.cif"))
        );
        assert_eq!(locator.resolve("P3", ""), None);
    }
}
