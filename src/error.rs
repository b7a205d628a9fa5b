// src/error.rs
//! Error taxonomy for the issuance service.
//!
//! Every pipeline stage fails fast with one of these variants. Nothing here is
//! retried internally; callers decide whether to re-run the pipeline.

use crate::models::credential::ContentRecord;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Holder address failed format validation. Raised before any I/O.
    #[error("invalid holder address: {0}")]
    InvalidHolderAddress(String),

    /// Issuer signing key or ledger identity is missing or malformed.
    #[error("issuer configuration error: {0}")]
    IssuerConfiguration(String),

    /// Pinning service answered with a non-success status or could not be reached.
    #[error("pinning service error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    PinningService {
        status: Option<u16>,
        message: String,
    },

    /// `storeHash` submission failed: RPC error, revert, dropped tx or timeout.
    ///
    /// `pinned` is set when the credential had already been pinned, so the
    /// caller can reconcile the orphaned content.
    #[error("anchoring failed: {message}")]
    Anchoring {
        message: String,
        pinned: Option<ContentRecord>,
    },

    /// Contract returned data that does not match the expected ABI shape.
    #[error("contract decode error: {0}")]
    ContractDecode(String),

    /// Read-side ledger failure (RPC unreachable, call reverted).
    #[error("ledger error: {0}")]
    Ledger(String),

    /// A compact token could not be decoded or was not signed by its issuer.
    #[error("credential error: {0}")]
    Credential(String),

    /// Missing or wrong API token on a state-changing request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The request is authenticated but this service cannot act on it.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed caller input other than the holder address.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl Error {
    pub fn anchoring(message: impl Into<String>) -> Self {
        Error::Anchoring {
            message: message.into(),
            pinned: None,
        }
    }

    /// Attaches the pin that preceded a failed anchoring attempt.
    pub fn with_pinned(self, record: ContentRecord) -> Self {
        match self {
            Error::Anchoring { message, .. } => Error::Anchoring {
                message,
                pinned: Some(record),
            },
            other => other,
        }
    }

    /// Content record of an orphaned pin, if this error carries one.
    pub fn pinned(&self) -> Option<&ContentRecord> {
        match self {
            Error::Anchoring { pinned, .. } => pinned.as_ref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Credential(format!("JSON encoding failed: {e}"))
    }
}
