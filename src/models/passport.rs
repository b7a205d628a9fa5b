// src/models/passport.rs
//! Typed views of the state kept by the Anchor contract.
//!
//! These are the validated forms of what the contract returns; raw ABI values
//! never leave the contract client.

use chrono::{DateTime, Utc};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// Decoded result of `verifyPassport(hash)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PassportVerification {
    pub digest: String,
    pub is_anchored: bool,
    pub is_revoked: bool,
    /// `None` when the contract reports the zero address (unknown hash)
    pub issuer: Option<Address>,
    pub passport_type: String,
    /// `None` when the contract reports a zero timestamp
    pub issued_at: Option<DateTime<Utc>>,
}

impl PassportVerification {
    /// Anchored and not revoked.
    pub fn is_valid(&self) -> bool {
        self.is_anchored && !self.is_revoked
    }
}

/// Authorization state of an issuer account.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IssuerStatus {
    pub address: Address,
    pub authorized: bool,
    pub suspended: bool,
    pub info: String,
}

impl IssuerStatus {
    /// Authorized and not suspended.
    pub fn can_issue(&self) -> bool {
        self.authorized && !self.suspended
    }
}

/// One `HashAnchored` event together with the hash's current revocation state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AnchoredCredential {
    pub digest: String,
    pub issuer: Address,
    pub holder: Address,
    pub passport_type: String,
    pub anchored_at: DateTime<Utc>,
    pub revoked: bool,
}

/// A passport application as stored by `getApplication`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PassportApplication {
    /// Zero-based id accepted by `processApplication`
    pub id: u64,
    pub applicant: Address,
    pub cids: Vec<String>,
    pub processed: bool,
}

/// The passport currently assigned to a holder through `userHash`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HeldPassport {
    pub digest: String,
    pub passport_type: String,
    pub is_anchored: bool,
    pub is_revoked: bool,
    /// From the matching issuance log; `None` if no log records the hash
    pub issuer: Option<Address>,
    pub issued_at: Option<DateTime<Utc>>,
}

/// Everything the contract records about one holder.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HolderPassport {
    pub holder: Address,
    /// `None` if the holder never applied
    pub application: Option<PassportApplication>,
    /// `None` if no passport hash is assigned to the holder
    pub passport: Option<HeldPassport>,
}

impl HolderPassport {
    /// An anchored, unrevoked passport is assigned to the holder.
    pub fn has_valid_passport(&self) -> bool {
        self.passport
            .as_ref()
            .map_or(false, |p| p.is_anchored && !p.is_revoked)
    }
}
