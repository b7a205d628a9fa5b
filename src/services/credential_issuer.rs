// src/services/credential_issuer.rs
//! Credential Issuer Service
//!
//! Builds `did:ethr`-scoped passport credentials and signs them into compact
//! JWT form. This stage is pure CPU work: no network calls are made, and the
//! holder address is validated before anything else happens.

use crate::error::{Error, Result};
use crate::models::credential::{
    CredentialPayload, JwtHeader, PassportClaims, SignedCredential, VcClaim,
};
use crate::models::did::EthrDid;
use crate::utils::serialization::{decode_segment, deserialize, encode_json_segment, encode_segment};
use crate::wallet::key_management::CredentialSigner;
use chrono::Utc;
use log::debug;
use std::sync::Arc;

/// A compact token split into its decoded parts.
#[derive(Debug, Clone)]
pub struct DecodedCredential {
    pub header: JwtHeader,
    pub payload: CredentialPayload,
    /// `base64url(header).base64url(payload)` exactly as it appears in the token
    pub signing_input: String,
    pub signature: Vec<u8>,
}

/// Service that turns holder addresses into signed passport credentials.
///
/// Holds the issuer signer and the DID network name. Cheap to clone.
#[derive(Clone)]
pub struct CredentialIssuer {
    /// Issuer signing capability
    signer: Arc<dyn CredentialSigner>,

    /// Network segment of holder DIDs, e.g. "sepolia"
    network: String,
}

impl CredentialIssuer {
    /// Creates a new CredentialIssuer instance
    ///
    /// # Arguments
    /// * `signer` - Issuer signing capability
    /// * `network` - DID network name used for holder DIDs
    pub fn new(signer: Arc<dyn CredentialSigner>, network: impl Into<String>) -> Self {
        Self {
            signer,
            network: network.into(),
        }
    }

    /// Issuer DID embedded as `iss` in every credential.
    pub fn issuer_did(&self) -> &EthrDid {
        self.signer.did()
    }

    /// Subject DID for `holder` on this issuer's network.
    ///
    /// # Errors
    /// [`Error::InvalidHolderAddress`] if `holder` is not a well-formed address
    pub fn holder_did(&self, holder: &str) -> Result<EthrDid> {
        EthrDid::for_holder(&self.network, holder)
    }

    /// Builds and signs a credential with `nbf` set to the current time.
    ///
    /// # Errors
    /// - [`Error::InvalidHolderAddress`] if `holder` is not a well-formed address
    /// - any error raised by the signer
    pub fn build(&self, holder: &str, claims: PassportClaims) -> Result<SignedCredential> {
        self.build_at(holder, claims, Utc::now().timestamp())
    }

    /// Builds and signs a credential with an explicit not-before timestamp.
    pub fn build_at(&self, holder: &str, claims: PassportClaims, not_before: i64) -> Result<SignedCredential> {
        let subject = self.holder_did(holder)?;

        let payload = CredentialPayload {
            sub: subject,
            nbf: not_before,
            vc: VcClaim::passport(claims),
            iss: self.signer.did().clone(),
        };

        let header = JwtHeader {
            typ: "JWT".to_string(),
            alg: self.signer.algorithm().to_string(),
        };

        let signing_input = format!(
            "{}.{}",
            encode_json_segment(&header)?,
            encode_json_segment(&payload)?
        );
        let signature = self.signer.sign(signing_input.as_bytes())?;

        debug!("Signed credential for {} (nbf {})", payload.sub, not_before);
        Ok(SignedCredential::from_token(format!(
            "{}.{}",
            signing_input,
            encode_segment(&signature)
        )))
    }
}

/// Splits a compact token and decodes its header and payload.
///
/// The signature is not checked here; see [`crate::services::verifier`].
pub fn decode(token: &str) -> Result<DecodedCredential> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    let [header, payload, signature] = segments.as_slice() else {
        return Err(Error::Credential("token must have three segments".into()));
    };

    let header_json = decode_segment(header).map_err(Error::Credential)?;
    let payload_json = decode_segment(payload).map_err(Error::Credential)?;

    let decoded_header: JwtHeader = deserialize(utf8(&header_json)?)
        .map_err(|e| Error::Credential(format!("malformed header: {e}")))?;
    let decoded_payload: CredentialPayload = deserialize(utf8(&payload_json)?)
        .map_err(|e| Error::Credential(format!("malformed payload: {e}")))?;

    Ok(DecodedCredential {
        header: decoded_header,
        payload: decoded_payload,
        signing_input: format!("{header}.{payload}"),
        signature: decode_segment(signature).map_err(Error::Credential)?,
    })
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::Credential("segment is not UTF-8".into()))
}
