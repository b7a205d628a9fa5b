// src/blockchain/ledger_client.rs
//! Ledger client implementation.
//!
//! Provides the connection to the EVM JSON-RPC endpoint hosting the Anchor
//! contract, including the issuer wallet used to sign transactions.

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::wallet::key_management::KeyManager;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::LocalWallet;
use ethers::types::Address;
use log::info;
use reqwest::Url;
use std::sync::Arc;

/// Provider stack used for every contract interaction: HTTP transport with
/// the issuer wallet signing outgoing transactions.
pub type LedgerMiddleware = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Ledger client for managing the RPC connection and issuer wallet.
///
/// This client provides:
/// - An HTTP transport with an explicit request timeout
/// - Chain id verification against the configured network
/// - A signing middleware bound to the issuer key
#[derive(Clone)]
pub struct LedgerClient {
    /// Signing middleware over the RPC provider
    middleware: Arc<LedgerMiddleware>,
}

impl LedgerClient {
    /// Connects to the configured RPC endpoint.
    ///
    /// # Arguments
    /// * `config` - Application configuration (RPC URL, chain id, timeouts)
    /// * `keys` - Issuer key material
    ///
    /// # Errors
    /// Returns error if:
    /// - The RPC URL is malformed or the HTTP client cannot be built
    /// - The chain id cannot be retrieved ([`Error::Ledger`])
    /// - The endpoint serves a different chain ([`Error::IssuerConfiguration`])
    pub async fn connect(config: &AppConfig, keys: &KeyManager) -> Result<Self> {
        let url = Url::parse(&config.rpc_url)
            .map_err(|e| Error::IssuerConfiguration(format!("RPC_URL is not a valid URL: {e}")))?;
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| Error::Ledger(format!("failed to build RPC client: {e}")))?;

        let provider = Provider::new(Http::new_with_client(url, http_client)).interval(config.poll_interval);

        // Make sure we are about to sign for the chain we think we are on
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| Error::Ledger(format!("failed to fetch chain id: {e}")))?
            .as_u64();
        if chain_id != config.chain_id {
            return Err(Error::IssuerConfiguration(format!(
                "RPC endpoint serves chain {chain_id}, expected {}",
                config.chain_id
            )));
        }

        let wallet = keys.wallet(chain_id);
        let middleware = SignerMiddleware::new(provider, wallet);
        info!("Connected to chain {} as 0x{:x}", chain_id, keys.address());

        Ok(Self {
            middleware: Arc::new(middleware),
        })
    }

    /// Gets the issuer account address.
    pub fn address(&self) -> Address {
        self.middleware.address()
    }

    /// Shared signing middleware for contract bindings.
    pub fn middleware(&self) -> Arc<LedgerMiddleware> {
        self.middleware.clone()
    }
}
