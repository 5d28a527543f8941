//! Roster parsing.
//!
//! A roster is CSV with a header row followed by `full_name,identifier` rows.
//! Parsing is all-or-nothing: any bad row rejects the whole roster so an
//! event is never created with part of its participants.

use std::io::Read;
use std::path::Path;

use crate::error::IngestionError;

/// One data row of a roster, identifier still in plaintext.
#[derive(Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub full_name: String,
    pub identifier: String,
}

impl core::fmt::Debug for RosterEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RosterEntry")
            .field("full_name", &self.full_name)
            .field("identifier", &"<redacted>")
            .finish()
    }
}

/// Reads a roster file.
pub fn read_roster_file(path: impl AsRef<Path>) -> Result<Vec<RosterEntry>, IngestionError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    collect(reader)
}

/// Reads a roster from any byte source.
pub fn read_roster<R: Read>(source: R) -> Result<Vec<RosterEntry>, IngestionError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);
    collect(reader)
}

fn collect<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<RosterEntry>, IngestionError> {
    let mut entries = Vec::new();
    for (index, record) in reader.records().enumerate() {
        // 1-based, counting the header.
        let row = index + 2;
        let record = record?;
        if record.len() != 2 {
            return Err(IngestionError::ColumnCount {
                row,
                found: record.len(),
            });
        }

        let full_name = record[0].trim();
        let identifier = record[1].trim();
        if full_name.is_empty() {
            return Err(IngestionError::EmptyField {
                row,
                column: "full_name",
            });
        }
        if identifier.is_empty() {
            return Err(IngestionError::EmptyField {
                row,
                column: "identifier",
            });
        }
        if identifier.contains(';') {
            return Err(IngestionError::ReservedCharacter { row });
        }

        entries.push(RosterEntry {
            full_name: full_name.to_owned(),
            identifier: identifier.to_owned(),
        });
    }
    Ok(entries)
}
