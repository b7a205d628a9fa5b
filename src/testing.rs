// src/testing.rs
//! Shared fixtures and in-memory doubles for unit tests.

use crate::contracts::anchor_registry::{AnchorLedger, AnchorTransaction};
use crate::error::{Error, Result};
use crate::models::credential::{ContentRecord, PassportClaims, SignedCredential};
use crate::models::passport::{
    AnchoredCredential, HeldPassport, HolderPassport, IssuerStatus, PassportApplication, PassportVerification,
};
use crate::storage::ipfs_client::{ContentPinner, PinMetadata};
use crate::utils::crypto::{digest_hex, hash_data};
use crate::wallet::key_management::KeyManager;
use async_trait::async_trait;
use chrono::Utc;
use ethers::types::{Address, H256, U256};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const HOLDER: &str = "0xAbCdEf0123456789abcdef0123456789ABCD1234";

pub const ISSUER_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

pub fn issuer_keys() -> KeyManager {
    KeyManager::from_private_key(ISSUER_KEY, "sepolia").unwrap()
}

pub fn sample_claims() -> PassportClaims {
    PassportClaims {
        name: "Alice Nomad".into(),
        nationality: "Canadian".into(),
        residence: "Portugal".into(),
        visa: "Remote Work Visa".into(),
        valid_until: "2026-01-01".into(),
    }
}

/// Pinner that keeps content in memory and derives CIDs from the token hash.
#[derive(Default)]
pub struct MockPinner {
    content: Mutex<HashMap<String, SignedCredential>>,
    pinned: Mutex<Vec<SignedCredential>>,
    pin_calls: AtomicUsize,
    fail_status: Option<u16>,
}

impl MockPinner {
    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::default()
        }
    }

    pub fn pin_calls(&self) -> usize {
        self.pin_calls.load(Ordering::SeqCst)
    }

    pub fn pinned(&self) -> Vec<SignedCredential> {
        self.pinned.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentPinner for MockPinner {
    async fn pin(&self, credential: &SignedCredential, _metadata: &PinMetadata) -> Result<ContentRecord> {
        self.pin_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.fail_status {
            return Err(Error::PinningService {
                status: Some(status),
                message: "Service Unavailable".into(),
            });
        }

        // Base32-alphabet rendering of the hash keeps the CID well-formed
        let cid: String = std::iter::once("bafkrei".to_string())
            .chain(
                hash_data(credential.as_bytes())
                    .iter()
                    .flat_map(|b| [b >> 4, b & 0x0f])
                    .map(|n| ((b'a' + n) as char).to_string()),
            )
            .collect();

        self.content.lock().unwrap().insert(cid.clone(), credential.clone());
        self.pinned.lock().unwrap().push(credential.clone());
        Ok(ContentRecord {
            gateway_url: format!("https://gateway.test/ipfs/{cid}"),
            cid,
        })
    }

    async fn fetch(&self, cid: &str) -> Result<SignedCredential> {
        self.content
            .lock()
            .unwrap()
            .get(cid)
            .cloned()
            .ok_or_else(|| Error::PinningService {
                status: Some(404),
                message: format!("{cid} not found"),
            })
    }
}

/// Ledger double recording every submission.
#[derive(Default)]
pub struct MockLedger {
    stored: Mutex<Vec<[u8; 32]>>,
    revoked: Mutex<BTreeSet<[u8; 32]>>,
    issuers: Mutex<BTreeSet<Address>>,
    verifiers: Mutex<BTreeSet<Address>>,
    issuer_info: Mutex<String>,
    /// (applicant, processed), indexed by application id
    applications: Mutex<Vec<(Address, bool)>>,
    user_hashes: Mutex<HashMap<Address, [u8; 32]>>,
    hash_types: Mutex<HashMap<[u8; 32], String>>,
    store_calls: AtomicUsize,
    store_failure: Option<String>,
}

impl MockLedger {
    pub fn failing_store(message: &str) -> Self {
        Self {
            store_failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<[u8; 32]> {
        self.stored.lock().unwrap().clone()
    }

    pub fn seed_issuer(&self, issuer: Address) {
        self.issuers.lock().unwrap().insert(issuer);
    }

    /// Records a pending application and returns its zero-based id.
    pub fn seed_application(&self, applicant: Address) -> U256 {
        let mut applications = self.applications.lock().unwrap();
        applications.push((applicant, false));
        U256::from(applications.len() - 1)
    }

    pub fn issuer_info(&self) -> String {
        self.issuer_info.lock().unwrap().clone()
    }

    fn transaction(seed: &[u8]) -> AnchorTransaction {
        AnchorTransaction {
            tx_hash: H256::from(hash_data(seed)),
            block_number: Some(1),
        }
    }
}

#[async_trait]
impl AnchorLedger for MockLedger {
    async fn store_hash(&self, digest: [u8; 32]) -> Result<AnchorTransaction> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.store_failure {
            return Err(Error::anchoring(message.clone()));
        }
        self.stored.lock().unwrap().push(digest);
        Ok(Self::transaction(&digest))
    }

    async fn is_anchored(&self, digest: [u8; 32]) -> Result<bool> {
        Ok(self.stored.lock().unwrap().contains(&digest))
    }

    async fn verify_passport(&self, digest: [u8; 32]) -> Result<PassportVerification> {
        let is_anchored = self.is_anchored(digest).await?;
        Ok(PassportVerification {
            digest: digest_hex(&digest),
            is_anchored,
            is_revoked: self.revoked.lock().unwrap().contains(&digest),
            issuer: None,
            passport_type: if is_anchored { "DigitalNomadPassport".into() } else { String::new() },
            issued_at: is_anchored.then(Utc::now),
        })
    }

    async fn issuer_status(&self, issuer: Address) -> Result<IssuerStatus> {
        Ok(IssuerStatus {
            address: issuer,
            authorized: self.issuers.lock().unwrap().contains(&issuer),
            suspended: false,
            info: String::new(),
        })
    }

    async fn is_verifier(&self, account: Address) -> Result<bool> {
        Ok(self.verifiers.lock().unwrap().contains(&account))
    }

    async fn owner(&self) -> Result<Address> {
        Ok(Address::repeat_byte(0x0e))
    }

    async fn holder_passport(&self, holder: Address) -> Result<HolderPassport> {
        let application = self
            .applications
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .rev()
            .find(|(_, (applicant, _))| *applicant == holder)
            .map(|(id, (applicant, processed))| PassportApplication {
                id: id as u64,
                applicant: *applicant,
                cids: vec!["bafkreiapplication".into()],
                processed: *processed,
            });

        let digest = self.user_hashes.lock().unwrap().get(&holder).copied();
        let passport = match digest {
            Some(digest) => {
                let is_anchored = self.is_anchored(digest).await?;
                let passport_type = self.hash_types.lock().unwrap().get(&digest).cloned().unwrap_or_default();
                let is_revoked = self.revoked.lock().unwrap().contains(&digest);
                Some(HeldPassport {
                    digest: digest_hex(&digest),
                    passport_type,
                    is_anchored,
                    is_revoked,
                    issuer: None,
                    issued_at: Some(Utc::now()),
                })
            }
            None => None,
        };

        Ok(HolderPassport {
            holder,
            application,
            passport,
        })
    }

    async fn anchored_by(&self, issuer: Address) -> Result<Vec<AnchoredCredential>> {
        let revoked = self.revoked.lock().unwrap().clone();
        Ok(self
            .stored()
            .into_iter()
            .map(|digest| AnchoredCredential {
                digest: digest_hex(&digest),
                issuer,
                holder: Address::zero(),
                passport_type: "DigitalNomadPassport".into(),
                anchored_at: Utc::now(),
                revoked: revoked.contains(&digest),
            })
            .collect())
    }

    async fn issuers(&self) -> Result<Vec<Address>> {
        Ok(self.issuers.lock().unwrap().iter().copied().collect())
    }

    async fn verifiers(&self) -> Result<Vec<Address>> {
        Ok(self.verifiers.lock().unwrap().iter().copied().collect())
    }

    async fn add_issuer(&self, issuer: Address) -> Result<AnchorTransaction> {
        self.issuers.lock().unwrap().insert(issuer);
        Ok(Self::transaction(issuer.as_bytes()))
    }

    async fn remove_issuer(&self, issuer: Address) -> Result<AnchorTransaction> {
        self.issuers.lock().unwrap().remove(&issuer);
        Ok(Self::transaction(issuer.as_bytes()))
    }

    async fn add_verifier(&self, verifier: Address) -> Result<AnchorTransaction> {
        self.verifiers.lock().unwrap().insert(verifier);
        Ok(Self::transaction(verifier.as_bytes()))
    }

    async fn remove_verifier(&self, verifier: Address) -> Result<AnchorTransaction> {
        self.verifiers.lock().unwrap().remove(&verifier);
        Ok(Self::transaction(verifier.as_bytes()))
    }

    async fn revoke_hash(&self, digest: [u8; 32]) -> Result<AnchorTransaction> {
        if !self.is_anchored(digest).await? {
            return Err(Error::Ledger("revokeHash reverted: hash not anchored".into()));
        }
        self.revoked.lock().unwrap().insert(digest);
        Ok(Self::transaction(&digest))
    }

    async fn set_issuer_info(&self, info: String) -> Result<AnchorTransaction> {
        let tx = Self::transaction(info.as_bytes());
        *self.issuer_info.lock().unwrap() = info;
        Ok(tx)
    }

    async fn process_application(
        &self,
        application_id: U256,
        digest: [u8; 32],
        passport_type: String,
    ) -> Result<AnchorTransaction> {
        let applicant = {
            let mut applications = self.applications.lock().unwrap();
            let entry = (application_id < U256::from(applications.len()))
                .then(|| application_id.as_usize())
                .and_then(|id| applications.get_mut(id))
                .ok_or_else(|| Error::Ledger("processApplication reverted: unknown application".into()))?;
            if entry.1 {
                return Err(Error::Ledger("processApplication reverted: already processed".into()));
            }
            entry.1 = true;
            entry.0
        };

        self.stored.lock().unwrap().push(digest);
        self.user_hashes.lock().unwrap().insert(applicant, digest);
        self.hash_types.lock().unwrap().insert(digest, passport_type);
        Ok(Self::transaction(&digest))
    }
}
