// src/models/credential.rs
//! Verifiable Credential data model implementation.
//!
//! Defines the JWT-encoded [W3C Verifiable Credential](https://www.w3.org/TR/vc-data-model/)
//! payload issued to passport holders, the compact signed token produced from
//! it, and the records each pipeline stage hands to the next.

use crate::models::did::EthrDid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON-LD context of every issued credential.
pub const CREDENTIAL_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

/// Type tags of every issued credential.
pub const CREDENTIAL_TYPES: [&str; 2] = ["VerifiableCredential", "DigitalNomadPassport"];

/// JWS algorithm used for compact tokens (ECDSA over secp256k1 with SHA-256).
pub const JWT_ALGORITHM: &str = "ES256K";

/// Claim attributes describing the passport holder.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PassportClaims {
    pub name: String,
    pub nationality: String,
    pub residence: String,
    pub visa: String,
    /// ISO-8601 date, e.g. "2026-01-01"
    pub valid_until: String,
}

/// The `vc` claim of the JWT payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VcClaim {
    #[serde(rename = "@context")]
    pub context: Vec<String>,

    #[serde(rename = "type")]
    pub types: Vec<String>,

    pub credential_subject: PassportClaims,
}

impl VcClaim {
    pub fn passport(claims: PassportClaims) -> Self {
        Self {
            context: vec![CREDENTIAL_CONTEXT.to_string()],
            types: CREDENTIAL_TYPES.iter().map(|t| t.to_string()).collect(),
            credential_subject: claims,
        }
    }
}

/// Claim set that gets signed. Field order is the serialization order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialPayload {
    /// Subject DID: `did:ethr:<network>:<holder>`
    pub sub: EthrDid,

    /// Not-before, seconds since the Unix epoch
    pub nbf: i64,

    pub vc: VcClaim,

    /// Issuer DID
    pub iss: EthrDid,
}

/// Protected header of a compact token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JwtHeader {
    pub typ: String,
    pub alg: String,
}

/// A signed credential in compact JWS form (`header.payload.signature`).
///
/// The wrapped string is the single source of truth for both pinning and
/// digest computation; it is never re-serialized.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct SignedCredential(String);

impl SignedCredential {
    pub(crate) fn from_token(token: String) -> Self {
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for SignedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the pinning service stored a signed credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    /// Content identifier returned by the pinning service
    pub cid: String,
    /// Public gateway URL serving the pinned envelope
    pub gateway_url: String,
}

/// Result of anchoring a digest on the ledger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AnchorReceipt {
    /// `0x`-prefixed keccak-256 digest of the signed credential
    pub digest: String,
    /// `0x`-prefixed transaction hash of the confirmed `storeHash` call
    pub tx_hash: String,
}

/// Everything produced by one run of the issuance pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IssuanceReceipt {
    pub vc_jwt: SignedCredential,
    pub holder_did: EthrDid,
    pub issuer_did: EthrDid,
    pub digest: String,
    pub tx_hash: String,
    pub cid: String,
    pub ipfs_url: String,
}

/// Outcome of re-anchoring a previously pinned credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReanchorOutcome {
    pub cid: String,
    pub digest: String,
    /// `None` when the digest was already anchored and nothing was submitted
    pub tx_hash: Option<String>,
    pub already_anchored: bool,
}
