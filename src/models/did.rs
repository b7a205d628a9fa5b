// src/models/did.rs
//! Decentralized Identifier (DID) data model for `did:ethr` identities.
//!
//! Both the issuer and the credential holder are Ethereum accounts, so their
//! DIDs follow the [ethr DID method](https://github.com/decentralized-identity/ethr-did-resolver):
//! ```text
//! did:ethr:<network>:<address>
//! ```

use crate::error::{Error, Result};
use ethers::types::Address;
use ethers::utils::to_checksum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// DID method used for every identifier this service produces.
pub const DID_METHOD: &str = "ethr";

/// A `did:ethr` identifier bound to an Ethereum account.
///
/// # Normalization
/// The address is always rendered in its EIP-55 checksum form, so two DIDs
/// built from the same account compare equal regardless of the input casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EthrDid {
    /// Network name, e.g. "sepolia"
    pub network: String,
    /// Controlling account
    pub address: Address,
}

impl EthrDid {
    pub fn new(network: impl Into<String>, address: Address) -> Self {
        Self {
            network: network.into(),
            address,
        }
    }

    /// Builds the subject DID for a holder address supplied by a caller.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHolderAddress`] unless `holder` is a
    /// `0x`-prefixed 20-byte hex address.
    pub fn for_holder(network: &str, holder: &str) -> Result<Self> {
        Ok(Self::new(network, parse_address(holder)?))
    }
}

impl fmt::Display for EthrDid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "did:{}:{}:{}",
            DID_METHOD,
            self.network,
            to_checksum(&self.address, None)
        )
    }
}

impl FromStr for EthrDid {
    type Err = Error;

    fn from_str(did: &str) -> Result<Self> {
        let parts: Vec<&str> = did.split(':').collect();
        match parts.as_slice() {
            ["did", DID_METHOD, network, address] if !network.is_empty() => Ok(Self::new(
                *network,
                parse_address(address).map_err(|_| Error::Credential(format!("malformed DID: {did}")))?,
            )),
            _ => Err(Error::Credential(format!("unsupported DID: {did}"))),
        }
    }
}

impl TryFrom<String> for EthrDid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<EthrDid> for String {
    fn from(did: EthrDid) -> Self {
        did.to_string()
    }
}

/// Strictly validates an account address: `0x` prefix followed by 40 hex digits.
///
/// Mixed-case input is accepted without enforcing the EIP-55 checksum, matching
/// how wallets hand addresses to the portal.
pub fn parse_address(value: &str) -> Result<Address> {
    let trimmed = value.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| Error::InvalidHolderAddress(value.to_string()))?;

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidHolderAddress(value.to_string()));
    }

    Address::from_str(hex).map_err(|_| Error::InvalidHolderAddress(value.to_string()))
}
