// src/main.rs

//! # Digital Nomad Passport Issuer - Main Entry Point
//!
//! Issues `did:ethr` verifiable credentials, pins them to IPFS and anchors
//! their digests on the Anchor contract, behind a small HTTP API.
//!
//! ## Architecture Overview
//! 1. **Blockchain Layer**: `LedgerClient` and the typed `AnchorRegistry` contract client
//! 2. **Services Layer**: Credential issuance pipeline, verification, and API endpoints
//! 3. **Storage Layer**: Pinata for IPFS pinning
//! 4. **Cryptography Layer**: Issuer key management and ES256K signing
//!
//! ## Environment Variables Required
//! - `PRIVATE_KEY`: Issuer secp256k1 private key
//! - `RPC_URL`: Ledger JSON-RPC endpoint
//! - `ANCHOR_CONTRACT`: Deployed Anchor contract address
//! - `PINATA_JWT` (or `PINATA_API_KEY` and `PINATA_SECRET_API_KEY`): Pinning credentials
//! - `PINATA_GATEWAY_URL`: Gateway host serving pinned content
//! - `API_TOKEN`: Bearer token required on state-changing routes
//!
//! ## Optional
//! - `OWNER_PRIVATE_KEY`: Contract owner key enabling issuer/verifier management
//! - `CORS_ALLOWED_ORIGINS`: Comma-separated browser origins allowed to call the API

use crate::blockchain::ledger_client::LedgerClient;
use crate::config::AppConfig;
use crate::contracts::anchor_registry::{AnchorLedger, AnchorRegistry, SubmitSettings};
use crate::services::anchor_submitter::AnchorSubmitter;
use crate::services::api_server::{ApiAccess, ApiServer};
use crate::services::credential_issuer::CredentialIssuer;
use crate::services::issuance_pipeline::IssuancePipeline;
use crate::services::verifier::Verifier;
use crate::storage::ipfs_client::PinataStorage;
use crate::wallet::key_management::KeyManager;
use anyhow::{bail, Context};
use dotenv::dotenv;
use log::{info, warn};
use std::sync::Arc;

// Module declarations (organized by functional domain)
mod blockchain;    // Ledger RPC connection
mod config;        // Environment configuration
mod contracts;     // Anchor contract bindings
mod error;         // Error taxonomy
mod models;        // Data structures
mod services;      // Business logic and API
mod storage;       // IPFS pinning
mod utils;         // Helper functions
mod wallet;        // Issuer key operations

#[cfg(test)]
mod testing;

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load environment configuration
/// 2. Load the issuer key and connect to the ledger
/// 3. Initialize service components
/// 4. Start API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    info!("Loaded {:?}", config);

    let keys = KeyManager::from_private_key(&config.private_key, &config.did_network)
        .context("failed to load issuer key")?;
    let ledger_client = LedgerClient::connect(&config, &keys)
        .await
        .context("failed to connect to the ledger")?;

    let settings = SubmitSettings {
        confirmations: config.confirmations,
        confirmation_timeout: config.confirmation_timeout,
        from_block: config.anchor_deploy_block,
        log_page_size: config.log_block_range,
    };

    // One registry instance per signer so its transactions share one submission lock
    let registry = AnchorRegistry::new(config.anchor_contract, ledger_client.middleware(), settings);
    info!(
        "Anchoring to 0x{:x} from account 0x{:x}",
        registry.address(),
        ledger_client.address()
    );
    let registry: Arc<dyn AnchorLedger> = Arc::new(registry);

    let pinner = Arc::new(PinataStorage::new(&config).context("failed to initialize pinning client")?);
    let issuer = CredentialIssuer::new(Arc::new(keys), config.did_network.clone());
    info!("Issuing as {}", issuer.issuer_did());

    let pipeline = IssuancePipeline::new(issuer, pinner, AnchorSubmitter::new(registry.clone()));
    let verifier = Verifier::new(registry.clone());

    let access = ApiAccess::new(&config.api_token, &config.cors_allowed_origins)
        .context("invalid API access settings")?;
    let mut api_server = ApiServer::new(pipeline, verifier, registry, access);

    match &config.owner_private_key {
        Some(owner_key) => {
            let owner_keys = KeyManager::from_private_key(owner_key, &config.did_network)
                .context("failed to load owner key")?;
            let owner_client = LedgerClient::connect(&config, &owner_keys)
                .await
                .context("failed to connect the owner account")?;
            let owner_registry = AnchorRegistry::new(config.anchor_contract, owner_client.middleware(), settings);

            let owner = owner_registry.owner().await.context("failed to read the contract owner")?;
            if owner != owner_client.address() {
                bail!(
                    "OWNER_PRIVATE_KEY controls 0x{:x} but the contract owner is 0x{:x}",
                    owner_client.address(),
                    owner
                );
            }
            info!("Registry management enabled for owner 0x{:x}", owner);
            api_server = api_server.with_owner_ledger(Arc::new(owner_registry));
        }
        None => warn!("OWNER_PRIVATE_KEY not set; issuer and verifier management is disabled"),
    }

    // Start the HTTP server
    let api_server = Arc::new(api_server);
    api_server
        .run(config.bind_addr)
        .await
        .context("API server failed")?;

    Ok(())
}
