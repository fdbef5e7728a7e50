//! PubChem lookups with per-request retry.
//!
//! This crate provides:
//! - [`PubChemClient`]: resolves a CAS number to a [`CompoundRecord`] via two
//!   PUG REST calls (name → CID, CID → properties)
//! - [`retry`]: the attempt/backoff state machine wrapped around every request
//! - [`LookupError`]: per-identifier failures, whose messages end up in the
//!   output CSV's `error` column
//!
//! [`CompoundRecord`]: casenrich_shared::CompoundRecord

pub mod client;
pub mod retry;

pub use client::{CompoundProperties, PubChemClient, image_formula};
pub use retry::{Decision, RetryPolicy, send_with_retry};

/// Why a single lookup failed. `Display` is the user-facing row message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// Upstream answered 404.
    #[error("Compound not found in PubChem")]
    NotFound,

    /// Every attempt hit 429/503.
    #[error("Max retries exceeded")]
    MaxRetriesExceeded,

    /// Any other non-2xx response.
    #[error("HTTP {code}: {reason}")]
    Status { code: u16, reason: String },

    /// The name lookup returned no usable CID.
    #[error("No compound found for this CAS number")]
    NoCompound,

    /// The property lookup returned no record.
    #[error("Could not retrieve compound properties")]
    NoProperties,

    /// Connection, timeout, or body read failure.
    #[error("request failed: {0}")]
    Transport(String),

    /// The response body was not the expected JSON.
    #[error("invalid response: {0}")]
    Decode(String),
}
