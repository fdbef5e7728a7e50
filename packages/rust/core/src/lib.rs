//! Core pipeline for casenrich.
//!
//! This crate ties together CSV input, concurrent PubChem lookups, and CSV
//! output into the end-to-end [`pipeline::run`] workflow.

pub mod input;
pub mod output;
pub mod pipeline;

pub use input::{IDENTIFIER_COLUMNS, read_identifiers};
pub use output::{OUTPUT_COLUMNS, default_output_path, write_results};
pub use pipeline::{
    CompoundSource, ProgressReporter, RunConfig, RunSummary, SilentProgress, lookup_all, run,
    run_with_source,
};
