//! CSV input: locate the CAS column and extract identifiers.

use std::path::Path;

use tracing::{debug, info, instrument};

use casenrich_shared::{CasEnrichError, Result};

/// Recognized identifier columns, highest priority first. Matching is
/// case-sensitive.
pub const IDENTIFIER_COLUMNS: [&str; 4] = ["cas_number", "CAS", "cas", "CAS Number"];

/// Read every usable CAS number from `path`, in file order.
///
/// For each row the first recognized column with a non-blank value wins.
/// Rows without one are skipped without error.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_identifiers(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        return Err(CasEnrichError::validation(format!(
            "input file not found: {}",
            path.display()
        )));
    }

    // Short rows are tolerated; missing cells read as absent.
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| CasEnrichError::csv(path, e))?;

    let headers = reader
        .headers()
        .map_err(|e| CasEnrichError::csv(path, e))?
        .clone();

    // Column indexes in priority order; absent columns drop out.
    let columns: Vec<usize> = IDENTIFIER_COLUMNS
        .iter()
        .filter_map(|name| headers.iter().position(|h| h == *name))
        .collect();

    if columns.is_empty() {
        debug!(headers = ?headers, "no recognized identifier column");
    }

    let mut identifiers = Vec::new();
    let mut skipped = 0usize;

    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| CasEnrichError::csv(path, e))?;

        let value = columns
            .iter()
            .filter_map(|&idx| record.get(idx))
            .map(str::trim)
            .find(|v| !v.is_empty());

        match value {
            Some(cas) => identifiers.push(cas.to_string()),
            None => {
                // +2: header line, 1-based numbering
                debug!(line = i + 2, "no CAS number in row, skipping");
                skipped += 1;
            }
        }
    }

    info!(count = identifiers.len(), skipped, "read identifiers");
    Ok(identifiers)
}
