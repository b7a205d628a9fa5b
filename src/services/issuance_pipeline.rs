// src/services/issuance_pipeline.rs
//! Credential issuance pipeline.
//!
//! Runs Builder → Pinner → Submitter in sequence. Each stage's success is a
//! precondition for the next and any failure aborts the run. A credential
//! that was pinned but never anchored is reported, never silently dropped,
//! and can be reconciled later with [`IssuancePipeline::reanchor`].

use crate::error::{Error, Result};
use crate::models::credential::{IssuanceReceipt, PassportClaims, ReanchorOutcome};
use crate::services::anchor_submitter::AnchorSubmitter;
use crate::services::credential_issuer::CredentialIssuer;
use crate::services::verifier::Verifier;
use crate::storage::ipfs_client::{ContentPinner, PinMetadata};
use crate::utils::crypto::digest_hex;
use ethers::utils::to_checksum;
use log::{info, warn};
use std::sync::Arc;

pub struct IssuancePipeline {
    issuer: CredentialIssuer,
    pinner: Arc<dyn ContentPinner>,
    submitter: AnchorSubmitter,
}

impl IssuancePipeline {
    pub fn new(issuer: CredentialIssuer, pinner: Arc<dyn ContentPinner>, submitter: AnchorSubmitter) -> Self {
        Self {
            issuer,
            pinner,
            submitter,
        }
    }

    /// Issues, pins and anchors one credential.
    ///
    /// # Errors
    /// - [`Error::InvalidHolderAddress`] before any network call
    /// - [`Error::PinningService`] if pinning fails; nothing is anchored
    /// - [`Error::Anchoring`] carrying the pinned record if anchoring fails
    pub async fn issue(&self, holder: &str, claims: PassportClaims) -> Result<IssuanceReceipt> {
        let holder_did = self.issuer.holder_did(holder)?;
        let credential = self.issuer.build(holder, claims)?;

        let metadata = PinMetadata::credential(to_checksum(&holder_did.address, None));
        let record = self.pinner.pin(&credential, &metadata).await?;

        let anchor = match self.submitter.anchor(&credential).await {
            Ok(anchor) => anchor,
            Err(e) => {
                warn!(
                    "Orphaned pin: credential for {} pinned as {} but not anchored: {}",
                    holder_did, record.cid, e
                );
                return Err(e.with_pinned(record));
            }
        };

        info!("Issued credential {} to {}", anchor.digest, holder_did);
        Ok(IssuanceReceipt {
            vc_jwt: credential,
            holder_did,
            issuer_did: self.issuer.issuer_did().clone(),
            digest: anchor.digest,
            tx_hash: anchor.tx_hash,
            cid: record.cid,
            ipfs_url: record.gateway_url,
        })
    }

    /// Anchors a previously pinned credential if it is not anchored yet.
    ///
    /// Idempotent: a digest already on the ledger is reported, not resubmitted.
    ///
    /// # Errors
    /// - [`Error::PinningService`] or [`Error::InvalidInput`] if the CID cannot be fetched
    /// - [`Error::Credential`] if the content was not signed by this issuer
    /// - [`Error::Anchoring`] if submission fails
    pub async fn reanchor(&self, cid: &str) -> Result<ReanchorOutcome> {
        let credential = self.pinner.fetch(cid).await?;
        let verified = Verifier::verify_token(credential.as_str())?;
        if &verified.payload.iss != self.issuer.issuer_did() {
            return Err(Error::Credential(format!(
                "{cid} was issued by {}, not {}",
                verified.payload.iss,
                self.issuer.issuer_did()
            )));
        }

        let digest = digest_hex(&AnchorSubmitter::digest(&credential));
        if self.submitter.is_anchored(&credential).await? {
            info!("{} from {} is already anchored", digest, cid);
            return Ok(ReanchorOutcome {
                cid: cid.to_string(),
                digest,
                tx_hash: None,
                already_anchored: true,
            });
        }

        let anchor = self.submitter.anchor(&credential).await?;
        info!("Re-anchored {} from {}", anchor.digest, cid);
        Ok(ReanchorOutcome {
            cid: cid.to_string(),
            digest: anchor.digest,
            tx_hash: Some(anchor.tx_hash),
            already_anchored: false,
        })
    }
}
