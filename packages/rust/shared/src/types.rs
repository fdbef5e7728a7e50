//! Core domain types for casenrich lookups and output rows.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CompoundRecord / LookupResult
// ---------------------------------------------------------------------------

/// Metadata resolved for one CAS number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundRecord {
    /// IUPAC name, falling back to the PubChem title.
    pub name: String,
    /// SMILES structure notation.
    pub smiles: String,
    /// Molecular formula.
    pub formula: String,
    /// Spreadsheet `=IMAGE(...)` formula pointing at the structure PNG.
    pub image: String,
}

/// Outcome of resolving a single identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// The compound was found and its properties retrieved.
    Success(CompoundRecord),
    /// The lookup failed; the message is written to the `error` column.
    Failed(String),
}

impl LookupResult {
    /// Shorthand for building a failure from any displayable error.
    pub fn failed(err: impl std::fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn status(&self) -> LookupStatus {
        match self {
            Self::Success(_) => LookupStatus::Success,
            Self::Failed(_) => LookupStatus::Failed,
        }
    }
}

/// Status column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupStatus {
    Success,
    Failed,
}

// ---------------------------------------------------------------------------
// OutputRow
// ---------------------------------------------------------------------------

/// One flattened row of the results CSV. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    pub cas_number: String,
    pub name: String,
    pub smiles: String,
    pub formula: String,
    pub image: String,
    pub status: LookupStatus,
    pub error: String,
}

impl OutputRow {
    /// Flatten a lookup result; inapplicable fields become empty strings.
    pub fn new(cas_number: impl Into<String>, result: &LookupResult) -> Self {
        let cas_number = cas_number.into();
        let status = result.status();
        match result {
            LookupResult::Success(record) => Self {
                cas_number,
                name: record.name.clone(),
                smiles: record.smiles.clone(),
                formula: record.formula.clone(),
                image: record.image.clone(),
                status,
                error: String::new(),
            },
            LookupResult::Failed(message) => Self {
                cas_number,
                name: String::new(),
                smiles: String::new(),
                formula: String::new(),
                image: String::new(),
                status,
                error: message.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formaldehyde() -> CompoundRecord {
        CompoundRecord {
            name: "formaldehyde".into(),
            smiles: "C=O".into(),
            formula: "CH2O".into(),
            image: r#"=IMAGE("https://pubchem.ncbi.nlm.nih.gov/rest/pug/compound/cid/712/PNG")"#
                .into(),
        }
    }

    #[test]
    fn success_row_has_empty_error() {
        let row = OutputRow::new("50-00-0", &LookupResult::Success(formaldehyde()));
        assert_eq!(row.cas_number, "50-00-0");
        assert_eq!(row.name, "formaldehyde");
        assert_eq!(row.status, LookupStatus::Success);
        assert!(row.error.is_empty());
    }

    #[test]
    fn failed_row_has_only_error() {
        let result = LookupResult::failed("No compound found for this CAS number");
        let row = OutputRow::new("0000-00-0", &result);
        assert_eq!(row.status, LookupStatus::Failed);
        assert_eq!(row.error, "No compound found for this CAS number");
        assert!(row.name.is_empty());
        assert!(row.smiles.is_empty());
        assert!(row.formula.is_empty());
        assert!(row.image.is_empty());
    }

    #[test]
    fn row_status_follows_result() {
        let ok = LookupResult::Success(formaldehyde());
        let failed = LookupResult::failed("x");
        assert_eq!(OutputRow::new("50-00-0", &ok).status, ok.status());
        assert_eq!(OutputRow::new("0000-00-0", &failed).status, failed.status());
        assert_eq!(failed.status(), LookupStatus::Failed);
    }
}
