//! Application configuration for casenrich.
//!
//! User config lives at `~/.casenrich/casenrich.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CasEnrichError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "casenrich.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".casenrich";

/// Public PubChem PUG REST root.
pub const DEFAULT_PUBCHEM_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";

// ---------------------------------------------------------------------------
// Config structs (matching casenrich.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// PubChem client settings.
    #[serde(default)]
    pub pubchem: PubChemConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Number of lookups allowed in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> u32 {
    5
}

/// `[pubchem]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubChemConfig {
    /// PUG REST root URL (no trailing slash required).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request transport timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per HTTP request before giving up on 429/503.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff unit; the delay after attempt `n` is `n * backoff_ms`.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for PubChemConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_PUBCHEM_URL.into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    1000
}

// ---------------------------------------------------------------------------
// Lookup config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime lookup configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Maximum concurrent lookups.
    pub concurrency: usize,
    /// PUG REST root URL.
    pub base_url: String,
    /// Per-request transport timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts per HTTP request.
    pub max_attempts: u32,
    /// Backoff unit in milliseconds.
    pub backoff_ms: u64,
}

impl From<&AppConfig> for LookupConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.defaults.concurrency as usize,
            base_url: config.pubchem.base_url.clone(),
            timeout_secs: config.pubchem.timeout_secs,
            max_attempts: config.pubchem.max_attempts,
            backoff_ms: config.pubchem.backoff_ms,
        }
    }
}

impl LookupConfig {
    /// Check values that would otherwise fail deep inside the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CasEnrichError::config("max_attempts must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(CasEnrichError::config("timeout_secs must be at least 1"));
        }
        Url::parse(&self.base_url).map_err(|e| {
            CasEnrichError::config(format!("invalid PubChem base_url '{}': {e}", self.base_url))
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.casenrich/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CasEnrichError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.casenrich/casenrich.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CasEnrichError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CasEnrichError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CasEnrichError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CasEnrichError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CasEnrichError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
