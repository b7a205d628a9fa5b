// src/utils/crypto.rs
//! Cryptographic utilities optimized for blockchain compatibility.
//!
//! Uses Keccak-256 (Ethereum's standard hash function) for all digests, so a
//! digest computed here matches `keccak256(bytes)` inside the Anchor contract.

use ethers::utils::{hex, keccak256};

/// Computes a Keccak-256 hash of the input data (Ethereum-compatible).
///
/// # Arguments
/// * `data` - Binary data to hash (as bytes slice)
///
/// # Returns
/// Fixed-size 32-byte array (`[u8; 32]`) containing the hash.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// Renders a 32-byte digest as `0x`-prefixed lowercase hex.
pub fn digest_hex(digest: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(digest))
}

/// Parses a `0x`-prefixed (or bare) 64-character hex string into a digest.
pub fn parse_digest(value: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(value.trim().trim_start_matches("0x")).ok()?;
    bytes.try_into().ok()
}
