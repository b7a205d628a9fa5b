// src/wallet/key_management.rs
//! Cryptographic key management for the credential issuer.
//!
//! Holds the issuer's secp256k1 key (loaded once from configuration) and
//! provides:
//! - Issuer account address and `did:ethr` identity derivation
//! - ES256K signing of compact-token signing inputs
//! - Signer-address recovery for verifying tokens
//! - The ledger wallet used to sign anchoring transactions
//!
//! Uses the following cryptographic primitives:
//! - secp256k1 curve (via `k256` crate)
//! - SHA-256 prehashing for JWS signatures (ES256K)
//! - Keccak-256 address derivation (via `ethers` crate)

use crate::error::{Error, Result};
use crate::models::credential::JWT_ALGORITHM;
use crate::models::did::EthrDid;
use ethers::signers::{LocalWallet, Signer as _};
use ethers::types::Address;
use ethers::utils::{hex, public_key_to_address, secret_key_to_address};
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use std::fmt;

/// Signing capability used by the credential builder.
///
/// Takes the canonical signing input (`base64url(header).base64url(payload)`)
/// and returns the raw JWS signature bytes for [`CredentialSigner::algorithm`].
pub trait CredentialSigner: Send + Sync {
    /// JWS `alg` header value
    fn algorithm(&self) -> &'static str;

    /// DID the signature is attributable to
    fn did(&self) -> &EthrDid;

    fn sign(&self, signing_input: &[u8]) -> Result<Vec<u8>>;
}

/// Issuer key material.
///
/// # Security Notes
/// - The secret key is never exposed, logged or serialized
/// - `Debug` prints only the issuer DID
#[derive(Clone)]
pub struct KeyManager {
    /// Issuer secp256k1 key
    signing_key: SigningKey,
    /// Issuer identity derived from the key and network name
    did: EthrDid,
}

impl KeyManager {
    /// Loads the issuer key from a hex-encoded private key.
    ///
    /// # Arguments
    /// * `private_key` - 32-byte hex key, with or without `0x` prefix
    /// * `network` - DID network name, e.g. "sepolia"
    ///
    /// # Errors
    /// [`Error::IssuerConfiguration`] if the key is empty, not hex, or not a
    /// valid secp256k1 scalar.
    pub fn from_private_key(private_key: &str, network: &str) -> Result<Self> {
        let trimmed = private_key.trim();
        if trimmed.is_empty() {
            return Err(Error::IssuerConfiguration("issuer private key is empty".into()));
        }

        let bytes = hex::decode(trimmed.trim_start_matches("0x"))
            .map_err(|_| Error::IssuerConfiguration("issuer private key is not valid hex".into()))?;
        if bytes.len() != 32 {
            return Err(Error::IssuerConfiguration(format!(
                "issuer private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }

        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|_| Error::IssuerConfiguration("issuer private key is not a valid secp256k1 key".into()))?;
        let did = EthrDid::new(network, secret_key_to_address(&signing_key));

        Ok(Self { signing_key, did })
    }

    /// Issuer account address.
    pub fn address(&self) -> Address {
        self.did.address
    }

    /// Ledger wallet for signing transactions on `chain_id`.
    pub fn wallet(&self, chain_id: u64) -> LocalWallet {
        LocalWallet::from(self.signing_key.clone()).with_chain_id(chain_id)
    }
}

impl CredentialSigner for KeyManager {
    fn algorithm(&self) -> &'static str {
        JWT_ALGORITHM
    }

    fn did(&self) -> &EthrDid {
        &self.did
    }

    /// Signs with ECDSA (secp256k1) over a SHA-256 prehash.
    ///
    /// Returns the 64-byte `r || s` form required by JWS, with `s` normalized
    /// to the lower half of the curve order (RFC 6979 deterministic nonce).
    fn sign(&self, signing_input: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = self.signing_key.sign(signing_input);
        Ok(signature.to_vec())
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager").field("did", &self.did.to_string()).finish()
    }
}

/// Recovers every account that could have produced an ES256K signature.
///
/// JWS signatures carry no recovery id, so both candidates are returned.
pub fn recover_signers(signing_input: &[u8], signature: &[u8]) -> Vec<Address> {
    let Ok(signature) = Signature::from_slice(signature) else {
        return Vec::new();
    };

    [0u8, 1]
        .into_iter()
        .filter_map(RecoveryId::from_byte)
        .filter_map(|id| VerifyingKey::recover_from_msg(signing_input, &signature, id).ok())
        .map(|key| public_key_to_address(&key))
        .collect()
}
