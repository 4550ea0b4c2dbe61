//! Extraction of the free-energy change from the engine's delta-energy report.
//!
//! The report is free text: a banner, a tab-separated column header, and one data line per
//! evaluated model. The value is read with a deliberately small grammar:
//!
//! ```text
//! report    := line* last-line
//! last-line := the last line that is not blank
//! data-line := field ( '\t' field ){2,}      ; at least three fields
//!              where field[1] parses as a finite f64
//! ```
//!
//! Anything that does not match (no lines, too few fields, a header in second position)
//! yields `None`; parsing never fails.

use std::path::Path;
use tracing::debug;

const MIN_FIELDS: usize = 3;

pub fn parse_energy(content: &str) -> Option<f64> {
    let last_line = content.lines().rev().find(|line| !line.trim().is_empty())?;
    let fields: Vec<&str> = last_line.split('\t').collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }
    fields[1]
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Reads and parses a report file; a missing or unreadable file is treated as "no value".
pub fn read_energy(path: &Path) -> Option<f64> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_energy(&content),
        Err(e) => {
            debug!("Energy report {:?} could not be read: {}", path, e);
            None
        }
    }
}
