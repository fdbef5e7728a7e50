//! CSV output: fixed column order, one row per identifier.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use casenrich_shared::{CasEnrichError, OutputRow, Result};

/// Header of the results file, in column order.
pub const OUTPUT_COLUMNS: [&str; 7] = [
    "cas_number",
    "name",
    "smiles",
    "formula",
    "image",
    "status",
    "error",
];

/// Suffix that replaces (or follows) the input's `.csv` extension.
const RESULTS_SUFFIX: &str = "_results.csv";

/// Derive the results path next to the input file.
///
/// `foo.csv` / `foo.CSV` become `foo_results.csv`; any other name gets the
/// suffix appended as-is (`foo.txt` → `foo.txt_results.csv`).
pub fn default_output_path(input: &Path) -> PathBuf {
    if let Some(s) = input.to_str() {
        let split = s.len().saturating_sub(4);
        if s.len() >= 4 && s.is_char_boundary(split) && s[split..].eq_ignore_ascii_case(".csv") {
            return PathBuf::from(format!("{}{RESULTS_SUFFIX}", &s[..split]));
        }
    }

    let mut raw = OsString::from(input.as_os_str());
    raw.push(RESULTS_SUFFIX);
    PathBuf::from(raw)
}

/// Write `rows` to `path`, replacing any existing file.
#[instrument(skip_all, fields(path = %path.display(), rows = rows.len()))]
pub fn write_results(path: &Path, rows: &[OutputRow]) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| CasEnrichError::io(path, e))?;

    // The header is written explicitly so an empty run still gets one.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    writer
        .write_record(OUTPUT_COLUMNS)
        .map_err(|e| CasEnrichError::csv(path, e))?;

    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| CasEnrichError::csv(path, e))?;
    }

    writer.flush().map_err(|e| CasEnrichError::io(path, e))?;

    info!("results written");
    Ok(())
}
