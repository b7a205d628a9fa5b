// src/services/verifier.rs
//! Credential verification service.
//!
//! Checks compact credentials offline (structure, algorithm and issuer
//! signature) and online against the Anchor contract (anchoring, revocation
//! and issuer authorization).

use crate::contracts::anchor_registry::AnchorLedger;
use crate::error::{Error, Result};
use crate::models::credential::{CredentialPayload, SignedCredential, JWT_ALGORITHM};
use crate::models::did::parse_address;
use crate::models::passport::{AnchoredCredential, HolderPassport, IssuerStatus, PassportVerification};
use crate::services::anchor_submitter::AnchorSubmitter;
use crate::services::credential_issuer::decode;
use crate::utils::crypto::{digest_hex, parse_digest};
use crate::wallet::key_management::recover_signers;
use log::debug;
use serde::Serialize;
use std::sync::Arc;

/// A credential whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedCredential {
    pub payload: CredentialPayload,
    /// `0x`-prefixed digest the ledger would know this credential by
    pub digest: String,
}

/// Full verification outcome: signature plus ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialReport {
    pub credential: VerifiedCredential,
    pub passport: PassportVerification,
    pub issuer: IssuerStatus,
}

impl CredentialReport {
    /// Anchored, unrevoked, and issued by an authorized, unsuspended issuer.
    pub fn is_valid(&self) -> bool {
        self.passport.is_valid() && self.issuer.can_issue()
    }
}

/// Credential verifier backed by the Anchor contract.
///
/// The Verifier provides:
/// - Offline signature checks via [`Verifier::verify_token`]
/// - Ledger lookups for passports and issuers
pub struct Verifier {
    /// Shared ledger handle
    ledger: Arc<dyn AnchorLedger>,
}

impl Verifier {
    pub fn new(ledger: Arc<dyn AnchorLedger>) -> Self {
        Self { ledger }
    }

    /// Verifies a compact token's structure and issuer signature.
    ///
    /// # Errors
    /// [`Error::Credential`] if:
    /// - The token is not three base64url segments of JSON
    /// - The header algorithm is not ES256K
    /// - No key recovered from the signature controls the `iss` DID
    pub fn verify_token(token: &str) -> Result<VerifiedCredential> {
        let decoded = decode(token)?;
        if decoded.header.alg != JWT_ALGORITHM {
            return Err(Error::Credential(format!(
                "unsupported algorithm {}",
                decoded.header.alg
            )));
        }

        let issuer = decoded.payload.iss.address;
        if !recover_signers(decoded.signing_input.as_bytes(), &decoded.signature).contains(&issuer) {
            return Err(Error::Credential(format!(
                "signature does not match issuer {}",
                decoded.payload.iss
            )));
        }

        let credential = SignedCredential::from_token(token.trim().to_string());
        let digest = digest_hex(&AnchorSubmitter::digest(&credential));
        debug!("Verified signature of {} by {}", digest, decoded.payload.iss);

        Ok(VerifiedCredential {
            payload: decoded.payload,
            digest,
        })
    }

    /// Verifies the signature, then looks up the digest and its issuer on-chain.
    pub async fn verify_credential(&self, token: &str) -> Result<CredentialReport> {
        let credential = Self::verify_token(token)?;
        let passport = self.passport_status(&credential.digest).await?;
        let issuer = self.ledger.issuer_status(credential.payload.iss.address).await?;

        Ok(CredentialReport {
            credential,
            passport,
            issuer,
        })
    }

    /// `verifyPassport` for a `0x`-prefixed digest or a compact token.
    ///
    /// Tokens must decode as a compact credential and are then hashed as
    /// given; their signature is not checked here.
    pub async fn passport_status(&self, digest_or_token: &str) -> Result<PassportVerification> {
        let value = digest_or_token.trim();
        let digest = if value.contains('.') {
            decode(value).map_err(|e| Error::InvalidInput(format!("not a digest or compact credential: {e}")))?;
            AnchorSubmitter::digest(&SignedCredential::from_token(value.to_string()))
        } else {
            parse_digest(value).ok_or_else(|| Error::InvalidInput(format!("not a 32-byte hex digest: {value}")))?
        };
        self.ledger.verify_passport(digest).await
    }

    /// Application and passport state the contract holds for `holder`.
    pub async fn holder_passport(&self, holder: &str) -> Result<HolderPassport> {
        let address = parse_address(holder)?;
        self.ledger.holder_passport(address).await
    }

    pub async fn issuer_status(&self, issuer: &str) -> Result<IssuerStatus> {
        let address = parse_address(issuer).map_err(|_| Error::InvalidInput(format!("not an address: {issuer}")))?;
        self.ledger.issuer_status(address).await
    }

    /// Credentials anchored by `issuer`, newest last.
    pub async fn issued_by(&self, issuer: &str) -> Result<Vec<AnchoredCredential>> {
        let address = parse_address(issuer).map_err(|_| Error::InvalidInput(format!("not an address: {issuer}")))?;
        self.ledger.anchored_by(address).await
    }
}
