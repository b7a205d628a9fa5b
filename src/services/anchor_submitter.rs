// src/services/anchor_submitter.rs
//! Anchor Submitter Service
//!
//! Hashes a signed credential and records the digest on the Anchor contract.

use crate::contracts::anchor_registry::AnchorLedger;
use crate::error::Result;
use crate::models::credential::{AnchorReceipt, SignedCredential};
use crate::utils::crypto::{digest_hex, hash_data};
use log::info;
use std::sync::Arc;

/// Submits credential digests to the ledger.
#[derive(Clone)]
pub struct AnchorSubmitter {
    ledger: Arc<dyn AnchorLedger>,
}

impl AnchorSubmitter {
    pub fn new(ledger: Arc<dyn AnchorLedger>) -> Self {
        Self { ledger }
    }

    /// Keccak-256 of the token bytes, exactly as they were signed and pinned.
    pub fn digest(credential: &SignedCredential) -> [u8; 32] {
        hash_data(credential.as_bytes())
    }

    /// Calls `storeHash` with the credential digest and waits for confirmation.
    ///
    /// # Errors
    /// [`crate::error::Error::Anchoring`] on RPC failure, revert, dropped
    /// transaction or confirmation timeout.
    pub async fn anchor(&self, credential: &SignedCredential) -> Result<AnchorReceipt> {
        let digest = Self::digest(credential);
        let transaction = self.ledger.store_hash(digest).await?;

        let receipt = AnchorReceipt {
            digest: digest_hex(&digest),
            tx_hash: format!("0x{:x}", transaction.tx_hash),
        };
        info!(
            "Anchored {} in 0x{:x} (block {:?})",
            receipt.digest, transaction.tx_hash, transaction.block_number
        );
        Ok(receipt)
    }

    /// Whether the credential digest is already recorded.
    pub async fn is_anchored(&self, credential: &SignedCredential) -> Result<bool> {
        self.ledger.is_anchored(Self::digest(credential)).await
    }
}
