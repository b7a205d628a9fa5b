// src/storage/ipfs_client.rs
//! IPFS pinning client for signed credentials.
//!
//! Pins compact credentials through the Pinata `pinJSONToIPFS` endpoint and
//! reads them back through the configured gateway:
//! - The token is wrapped in a `{"vc": <token>}` envelope before upload
//! - Non-success statuses surface as [`Error::PinningService`], never retried
//! - Gateway URLs are derived by templating the gateway host with the CID
//!
//! # Security Considerations
//! - Pinned content is public; credentials must not carry secrets
//! - Pins are never removed by this client, even when a later stage fails

use crate::config::{AppConfig, PinataAuth};
use crate::error::{Error, Result};
use crate::models::credential::{ContentRecord, SignedCredential};
use crate::utils::serialization::serialize;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

/// Metadata name attached to every pinned credential.
pub const PIN_NAME: &str = "DigitalNomadPassportVC";

/// Descriptive metadata stored alongside a pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinMetadata {
    pub name: String,
    /// Checksummed holder address
    pub holder: String,
}

impl PinMetadata {
    pub fn credential(holder: impl Into<String>) -> Self {
        Self {
            name: PIN_NAME.to_string(),
            holder: holder.into(),
        }
    }
}

/// Content-addressed storage for signed credentials.
#[async_trait]
pub trait ContentPinner: Send + Sync {
    /// Pins the exact token bytes and returns where they can be fetched.
    async fn pin(&self, credential: &SignedCredential, metadata: &PinMetadata) -> Result<ContentRecord>;

    /// Fetches a previously pinned credential by content identifier.
    async fn fetch(&self, cid: &str) -> Result<SignedCredential>;
}

#[derive(Serialize, Deserialize)]
struct CredentialEnvelope {
    vc: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PinRequest<'a> {
    pinata_content: CredentialEnvelope,
    pinata_metadata: PinataMetadata<'a>,
    pinata_options: PinataOptions,
}

#[derive(Serialize)]
struct PinataMetadata<'a> {
    name: &'a str,
    keyvalues: KeyValues<'a>,
}

#[derive(Serialize)]
struct KeyValues<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    holder: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PinataOptions {
    cid_version: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PinResponse {
    ipfs_hash: String,
}

/// Pinata-backed pinning client.
///
/// Cheap to clone; the underlying reqwest client pools connections.
#[derive(Clone)]
pub struct PinataStorage {
    client: Client,
    /// API base URL without trailing slash
    api_url: String,
    /// Gateway host, with or without scheme
    gateway: String,
    auth: PinataAuth,
}

impl PinataStorage {
    /// Creates a client from the pinning section of the configuration.
    ///
    /// # Errors
    /// [`Error::PinningService`] if the HTTP client cannot be built.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| Error::PinningService {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self::with_client(
            client,
            &config.pinata_api_url,
            &config.pinata_gateway_url,
            config.pinata_auth.clone(),
        ))
    }

    pub fn with_client(client: Client, api_url: &str, gateway: &str, auth: PinataAuth) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            gateway: gateway.trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Public gateway URL of `cid`.
    pub fn gateway_url(&self, cid: &str) -> String {
        if self.gateway.starts_with("http://") || self.gateway.starts_with("https://") {
            format!("{}/ipfs/{}", self.gateway, cid)
        } else {
            format!("https://{}/ipfs/{}", self.gateway, cid)
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            PinataAuth::Bearer(jwt) => request.bearer_auth(jwt),
            PinataAuth::ApiKey { key, secret } => request
                .header("pinata_api_key", key)
                .header("pinata_secret_api_key", secret),
        }
    }
}

#[async_trait]
impl ContentPinner for PinataStorage {
    async fn pin(&self, credential: &SignedCredential, metadata: &PinMetadata) -> Result<ContentRecord> {
        let body = PinRequest {
            pinata_content: CredentialEnvelope {
                vc: credential.as_str().to_string(),
            },
            pinata_metadata: PinataMetadata {
                name: &metadata.name,
                keyvalues: KeyValues {
                    kind: "verifiable-credential",
                    holder: &metadata.holder,
                },
            },
            pinata_options: PinataOptions { cid_version: 1 },
        };

        let url = format!("{}/pinning/pinJSONToIPFS", self.api_url);
        debug!("Pinning credential for {} to {}", metadata.holder, url);

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(upstream_error(status, &text));
        }

        let parsed: PinResponse = serde_json::from_str(&text).map_err(|e| Error::PinningService {
            status: Some(status.as_u16()),
            message: format!("unexpected pin response: {e}"),
        })?;
        if !is_valid_cid(&parsed.ipfs_hash) {
            return Err(Error::PinningService {
                status: Some(status.as_u16()),
                message: format!("pin response carries a malformed CID: {}", parsed.ipfs_hash),
            });
        }

        let record = ContentRecord {
            gateway_url: self.gateway_url(&parsed.ipfs_hash),
            cid: parsed.ipfs_hash,
        };
        info!("Pinned credential as {}", record.cid);
        Ok(record)
    }

    async fn fetch(&self, cid: &str) -> Result<SignedCredential> {
        if !is_valid_cid(cid) {
            return Err(Error::InvalidInput(format!("not a content identifier: {cid}")));
        }

        let response = self
            .client
            .get(self.gateway_url(cid))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(upstream_error(status, &text));
        }

        let envelope: CredentialEnvelope = serde_json::from_str(&text)
            .map_err(|e| Error::Credential(format!("pinned content {cid} is not a credential envelope: {e}")))?;
        Ok(SignedCredential::from_token(envelope.vc))
    }
}

/// Checks the shape of a CIDv0 (`Qm` + base58btc) or CIDv1 (`b` + base32).
pub fn is_valid_cid(cid: &str) -> bool {
    const BASE58: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

    if cid.len() == 46 && cid.starts_with("Qm") {
        return cid.chars().all(|c| BASE58.contains(c));
    }
    match cid.strip_prefix('b') {
        Some(rest) if rest.len() >= 50 => rest.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')),
        _ => false,
    }
}

fn transport_error(error: reqwest::Error) -> Error {
    Error::PinningService {
        status: error.status().map(|s| s.as_u16()),
        message: error.to_string(),
    }
}

/// Pulls the most useful message out of an error body.
fn upstream_error(status: StatusCode, body: &str) -> Error {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: serde_json::Value,
    }

    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error: serde_json::Value::String(s) }) => s,
        Ok(ErrorBody { error }) => serialize(&error).unwrap_or_else(|_| body.to_string()),
        Err(_) if body.trim().is_empty() => status.canonical_reason().unwrap_or("no body").to_string(),
        Err(_) => body.trim().to_string(),
    };

    Error::PinningService {
        status: Some(status.as_u16()),
        message,
    }
}
