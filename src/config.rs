// src/config.rs
//! Application configuration.
//!
//! Built once at startup from environment variables (a `.env` file is loaded
//! first by `main`) and passed by reference to every component.

use crate::error::{Error, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment};
use reqwest::Url;
use ethers::types::Address;
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PINATA_API_URL: &str = "https://api.pinata.cloud";

/// Credentials for the pinning service.
#[derive(Clone, PartialEq, Eq)]
pub enum PinataAuth {
    /// Scoped API JWT, sent as `Authorization: Bearer <jwt>`
    Bearer(String),
    /// Legacy key pair, sent as `pinata_api_key` / `pinata_secret_api_key` headers
    ApiKey { key: String, secret: String },
}

impl fmt::Debug for PinataAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinataAuth::Bearer(_) => f.write_str("Bearer(***)"),
            PinataAuth::ApiKey { .. } => f.write_str("ApiKey(***)"),
        }
    }
}

/// Raw environment shape. Field names match the lower-cased variable names.
#[derive(Deserialize)]
struct RawConfig {
    private_key: Option<String>,
    owner_private_key: Option<String>,
    api_token: Option<String>,
    cors_allowed_origins: String,
    rpc_url: Option<String>,
    anchor_contract: Option<String>,
    pinata_jwt: Option<String>,
    pinata_api_key: Option<String>,
    pinata_secret_api_key: Option<String>,
    pinata_gateway_url: Option<String>,
    pinata_api_url: String,
    did_network: String,
    chain_id: u64,
    confirmations: usize,
    http_timeout_secs: u64,
    confirmation_timeout_secs: u64,
    poll_interval_millis: u64,
    anchor_deploy_block: u64,
    log_block_range: u64,
    bind_addr: String,
}

/// Validated configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Hex-encoded issuer private key
    pub private_key: String,
    /// Contract owner key; registry management is disabled without it
    pub owner_private_key: Option<String>,
    /// Bearer token required on every state-changing route
    pub api_token: String,
    /// Browser origins allowed to call the API; empty disables CORS
    pub cors_allowed_origins: Vec<String>,
    /// Ledger JSON-RPC endpoint
    pub rpc_url: String,
    /// Deployed Anchor contract
    pub anchor_contract: Address,
    pub pinata_auth: PinataAuth,
    /// Pinning API base URL
    pub pinata_api_url: String,
    /// Gateway host (or full base URL) serving pinned content
    pub pinata_gateway_url: String,
    /// DID network segment, e.g. "sepolia"
    pub did_network: String,
    /// Chain id the RPC endpoint must report
    pub chain_id: u64,
    /// Confirmation depth awaited after each transaction
    pub confirmations: usize,
    pub http_timeout: Duration,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    /// First block scanned for contract events
    pub anchor_deploy_block: u64,
    /// Widest block range requested per `eth_getLogs` call
    pub log_block_range: u64,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_builder(Config::builder().add_source(Environment::default()))
    }

    /// Applies defaults to `builder` and validates the result.
    ///
    /// # Errors
    /// - [`Error::Config`] if a required value is missing or has the wrong type
    /// - [`Error::IssuerConfiguration`] if the private key is absent
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let raw: RawConfig = builder
            .set_default("pinata_api_url", DEFAULT_PINATA_API_URL)?
            .set_default("did_network", "sepolia")?
            .set_default("chain_id", 11_155_111_i64)?
            .set_default("confirmations", 1_i64)?
            .set_default("http_timeout_secs", 30_i64)?
            .set_default("confirmation_timeout_secs", 180_i64)?
            .set_default("poll_interval_millis", 2_000_i64)?
            .set_default("anchor_deploy_block", 0_i64)?
            .set_default("log_block_range", 2_000_i64)?
            .set_default("cors_allowed_origins", "")?
            .set_default("bind_addr", "127.0.0.1:3000")?
            .build()?
            .try_deserialize()?;

        let private_key = non_empty(raw.private_key)
            .ok_or_else(|| Error::IssuerConfiguration("PRIVATE_KEY must be set".into()))?;
        let api_token = required(raw.api_token, "API_TOKEN")?;
        if api_token.len() < 16 {
            return Err(missing("API_TOKEN must be at least 16 characters".into()));
        }
        let rpc_url = required(raw.rpc_url, "RPC_URL")?;
        let anchor_contract = required(raw.anchor_contract, "ANCHOR_CONTRACT")?;
        let anchor_contract = Address::from_str(anchor_contract.trim_start_matches("0x"))
            .map_err(|_| missing(format!("ANCHOR_CONTRACT is not an address: {anchor_contract}")))?;
        let pinata_gateway_url = required(raw.pinata_gateway_url, "PINATA_GATEWAY_URL")?;

        let pinata_auth = match (
            non_empty(raw.pinata_jwt),
            non_empty(raw.pinata_api_key),
            non_empty(raw.pinata_secret_api_key),
        ) {
            (Some(jwt), _, _) => PinataAuth::Bearer(jwt),
            (None, Some(key), Some(secret)) => PinataAuth::ApiKey { key, secret },
            _ => {
                return Err(missing(
                    "PINATA_JWT or PINATA_API_KEY and PINATA_SECRET_API_KEY must be set".into(),
                ))
            }
        };

        let bind_addr = raw
            .bind_addr
            .parse()
            .map_err(|_| missing(format!("BIND_ADDR is not a socket address: {}", raw.bind_addr)))?;

        if raw.confirmations == 0 {
            return Err(missing("CONFIRMATIONS must be at least 1".into()));
        }
        if raw.log_block_range == 0 {
            return Err(missing("LOG_BLOCK_RANGE must be at least 1".into()));
        }

        let cors_allowed_origins = raw
            .cors_allowed_origins
            .split(',')
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .map(|origin| match Url::parse(&origin) {
                Ok(url) if matches!(url.scheme(), "http" | "https") && url.path() == "/" => Ok(origin),
                _ => Err(missing(format!("CORS_ALLOWED_ORIGINS entry is not an origin: {origin}"))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            private_key,
            owner_private_key: non_empty(raw.owner_private_key),
            api_token,
            cors_allowed_origins,
            rpc_url,
            anchor_contract,
            pinata_auth,
            pinata_api_url: raw.pinata_api_url.trim_end_matches('/').to_string(),
            pinata_gateway_url,
            did_network: raw.did_network,
            chain_id: raw.chain_id,
            confirmations: raw.confirmations,
            http_timeout: Duration::from_secs(raw.http_timeout_secs),
            confirmation_timeout: Duration::from_secs(raw.confirmation_timeout_secs),
            poll_interval: Duration::from_millis(raw.poll_interval_millis),
            anchor_deploy_block: raw.anchor_deploy_block,
            log_block_range: raw.log_block_range,
            bind_addr,
        })
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("rpc_url", &self.rpc_url)
            .field("anchor_contract", &self.anchor_contract)
            .field("pinata_auth", &self.pinata_auth)
            .field("pinata_api_url", &self.pinata_api_url)
            .field("pinata_gateway_url", &self.pinata_gateway_url)
            .field("did_network", &self.did_network)
            .field("chain_id", &self.chain_id)
            .field("confirmations", &self.confirmations)
            .field("owner_key_configured", &self.owner_private_key.is_some())
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("log_block_range", &self.log_block_range)
            .field("bind_addr", &self.bind_addr)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    non_empty(value).ok_or_else(|| missing(format!("{name} must be set")))
}

fn missing(message: String) -> Error {
    Error::Config(config::ConfigError::Message(message))
}
