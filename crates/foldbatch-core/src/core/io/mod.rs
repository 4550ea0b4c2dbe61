//! Input/output for the files the pipeline consumes and produces.
//!
//! Mutation tables are comma-separated files with a header row; structure files are
//! PDB or mmCIF (optionally gzip-compressed) and are transcribed into the engine's
//! PDB input; engine reports are tab-separated text whose energy value is extracted
//! by a small explicit grammar.

pub mod report;
pub mod structure;
pub mod table;
