//! Shared types, error model, and configuration for casenrich.
//!
//! This crate is the foundation depended on by all other casenrich crates.
//! It provides:
//! - [`CasEnrichError`]: the unified fatal error type
//! - Domain types ([`CompoundRecord`], [`LookupResult`], [`OutputRow`])
//! - Configuration ([`AppConfig`], [`LookupConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_PUBCHEM_URL, DefaultsConfig, LookupConfig, PubChemConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{CasEnrichError, Result};
pub use types::{CompoundRecord, LookupResult, LookupStatus, OutputRow};
