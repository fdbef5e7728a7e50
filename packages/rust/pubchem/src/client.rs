//! PubChem PUG REST client: CAS number → CID → compound properties.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use casenrich_shared::{CasEnrichError, CompoundRecord, LookupConfig, LookupResult, Result};

use crate::LookupError;
use crate::retry::{RetryPolicy, send_with_retry};

/// User-Agent string for PubChem requests.
const USER_AGENT: &str = concat!("casenrich/", env!("CARGO_PKG_VERSION"));

/// Properties requested for every compound, comma-joined into the URL.
const PROPERTY_FIELDS: &str = "IUPACName,Title,MolecularFormula,SMILES,CanonicalSMILES";

/// PNG rendering endpoint embedded in the spreadsheet image formula.
const IMAGE_URL_PREFIX: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug/compound/cid";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CidResponse {
    #[serde(rename = "IdentifierList")]
    identifier_list: Option<IdentifierList>,
}

#[derive(Debug, Deserialize)]
struct IdentifierList {
    #[serde(rename = "CID", default)]
    cid: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct PropertyResponse {
    #[serde(rename = "PropertyTable")]
    property_table: Option<PropertyTable>,
}

#[derive(Debug, Deserialize)]
struct PropertyTable {
    #[serde(rename = "Properties", default)]
    properties: Vec<CompoundProperties>,
}

/// A single entry of `PropertyTable.Properties`. Every field is optional
/// upstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompoundProperties {
    #[serde(rename = "IUPACName")]
    pub iupac_name: Option<String>,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "MolecularFormula")]
    pub molecular_formula: Option<String>,
    #[serde(rename = "SMILES")]
    pub smiles: Option<String>,
    #[serde(rename = "CanonicalSMILES")]
    pub canonical_smiles: Option<String>,
}

impl CompoundProperties {
    /// Build the output record, taking the first non-empty candidate per field.
    pub fn into_record(self, cid: u64) -> CompoundRecord {
        CompoundRecord {
            name: first_present([self.iupac_name, self.title]),
            smiles: first_present([self.smiles, self.canonical_smiles]),
            formula: first_present([self.molecular_formula]),
            image: image_formula(cid),
        }
    }
}

fn first_present<const N: usize>(candidates: [Option<String>; N]) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .unwrap_or_default()
}

/// Spreadsheet formula rendering the compound's structure image.
pub fn image_formula(cid: u64) -> String {
    format!(r#"=IMAGE("{IMAGE_URL_PREFIX}/{cid}/PNG")"#)
}

// ---------------------------------------------------------------------------
// PubChemClient
// ---------------------------------------------------------------------------

/// HTTP client for the two-step CAS lookup.
#[derive(Debug, Clone)]
pub struct PubChemClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl PubChemClient {
    /// Create a client from the runtime lookup configuration.
    pub fn new(config: &LookupConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            CasEnrichError::config(format!("invalid PubChem base_url '{}': {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CasEnrichError::config(format!(
                "PubChem base_url '{base_url}' cannot be used as a base URL"
            )));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CasEnrichError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            retry: RetryPolicy::new(config.max_attempts, Duration::from_millis(config.backoff_ms)),
        })
    }

    /// Resolve one CAS number. Never fails: errors become [`LookupResult::Failed`].
    #[instrument(skip_all, fields(cas = %cas))]
    pub async fn lookup(&self, cas: &str) -> LookupResult {
        match self.resolve(cas).await {
            Ok(record) => LookupResult::Success(record),
            Err(err) => {
                debug!(error = %err, "lookup failed");
                LookupResult::failed(err)
            }
        }
    }

    /// The two-step resolution with typed errors.
    pub async fn resolve(&self, cas: &str) -> std::result::Result<CompoundRecord, LookupError> {
        let cid = self.fetch_cid(cas).await?.ok_or(LookupError::NoCompound)?;
        debug!(cid, "resolved CID");

        let properties = self
            .fetch_properties(cid)
            .await?
            .ok_or(LookupError::NoProperties)?;

        Ok(properties.into_record(cid))
    }

    /// `GET {base}/compound/name/{cas}/cids/JSON`; first positive CID, if any.
    pub async fn fetch_cid(&self, cas: &str) -> std::result::Result<Option<u64>, LookupError> {
        let url = self.endpoint(&["compound", "name", cas, "cids", "JSON"])?;
        let body: CidResponse = self.get_json(url).await?;

        // A zero CID does not identify a compound.
        Ok(body
            .identifier_list
            .and_then(|list| list.cid.into_iter().find(|&cid| cid > 0)))
    }

    /// `GET {base}/compound/cid/{cid}/property/{fields}/JSON`; first record, if any.
    pub async fn fetch_properties(
        &self,
        cid: u64,
    ) -> std::result::Result<Option<CompoundProperties>, LookupError> {
        let cid = cid.to_string();
        let url = self.endpoint(&["compound", "cid", &cid, "property", PROPERTY_FIELDS, "JSON"])?;
        let body: PropertyResponse = self.get_json(url).await?;

        Ok(body
            .property_table
            .and_then(|table| table.properties.into_iter().next()))
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, LookupError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| LookupError::Transport(format!("invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> std::result::Result<T, LookupError> {
        debug!(%url, "requesting");
        let response = send_with_retry(&self.retry, || self.client.get(url.clone()).send()).await?;

        let body = response
            .text()
            .await
            .map_err(|e| LookupError::Transport(format!("failed to read body: {e}")))?;

        serde_json::from_str(&body).map_err(|e| LookupError::Decode(e.to_string()))
    }
}
