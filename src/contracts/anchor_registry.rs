// src/contracts/anchor_registry.rs
//! Anchor smart contract interface.
//!
//! Provides typed bindings for the deployed Anchor contract, which records
//! credential digests and keeps the issuer/verifier registries. Every consumed
//! ABI entry point has one method here returning a validated value.

use crate::error::{Error, Result};
use crate::models::passport::{
    AnchoredCredential, HeldPassport, HolderPassport, IssuerStatus, PassportApplication, PassportVerification,
};
use crate::utils::crypto::digest_hex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::contract::builders::Event;
use ethers::contract::{abigen, ContractCall, ContractError, EthLogDecode};
use ethers::providers::Middleware;
use ethers::types::{Address, H256, U256, U64};
use log::{debug, info};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

abigen!(
    AnchorContract,
    r#"[
        function storeHash(bytes32 hash) external
        function isAnchored(bytes32 hash) external view returns (bool)
        function hasRevoked(bytes32 hash) external view returns (bool)
        function verifyPassport(bytes32 hash) external view returns (bool isAnchored_, bool isRevoked_, address issuer_, string pType_, uint256 issuedAt_)
        function authorizedIssuers(address account) external view returns (bool)
        function suspendedIssuers(address account) external view returns (bool)
        function authorizedVerifiers(address account) external view returns (bool)
        function issuerInfo(address account) external view returns (string)
        function owner() external view returns (address)
        function applicationIndex(address user) external view returns (uint256)
        function getApplication(uint256 index) external view returns (address user, string[] cids, bool processed)
        function userHash(address user) external view returns (bytes32)
        function anchoredHashes(bytes32 hash) external view returns (bool)
        function revokedHashes(bytes32 hash) external view returns (bool)
        function hashTypes(bytes32 hash) external view returns (string)
        function getLogsCount() external view returns (uint256)
        function logs(uint256 index) external view returns (bytes32 hash, address issuer, address user, string pType, uint256 timestamp)
        function setIssuerInfo(string info) external
        function addIssuer(address issuer) external
        function removeIssuer(address issuer) external
        function addVerifier(address verifier) external
        function removeVerifier(address verifier) external
        function revokeHash(bytes32 hash) external
        function processApplication(uint256 id, bytes32 hash, string pType) external
        event IssuerAdded(address indexed issuer)
        event VerifierAdded(address indexed verifier)
        event HashAnchored(bytes32 indexed hash, address indexed issuer, address indexed user, string pType, uint256 timestamp)
    ]"#
);

/// A confirmed ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorTransaction {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
}

/// Ledger operations the services depend on.
///
/// Implemented by [`AnchorRegistry`]; tests substitute in-memory doubles.
#[async_trait]
pub trait AnchorLedger: Send + Sync {
    /// `storeHash(digest)`, waiting for confirmation. Failures are [`Error::Anchoring`].
    async fn store_hash(&self, digest: [u8; 32]) -> Result<AnchorTransaction>;

    async fn is_anchored(&self, digest: [u8; 32]) -> Result<bool>;

    async fn verify_passport(&self, digest: [u8; 32]) -> Result<PassportVerification>;

    async fn issuer_status(&self, issuer: Address) -> Result<IssuerStatus>;

    async fn is_verifier(&self, account: Address) -> Result<bool>;

    async fn owner(&self) -> Result<Address>;

    /// Application, assigned passport hash and its issuance log for `holder`.
    async fn holder_passport(&self, holder: Address) -> Result<HolderPassport>;

    /// `HashAnchored` history of one issuer with current revocation state.
    async fn anchored_by(&self, issuer: Address) -> Result<Vec<AnchoredCredential>>;

    /// Currently authorized issuers, discovered from `IssuerAdded` events.
    async fn issuers(&self) -> Result<Vec<Address>>;

    /// Currently authorized verifiers, discovered from `VerifierAdded` events.
    async fn verifiers(&self) -> Result<Vec<Address>>;

    async fn add_issuer(&self, issuer: Address) -> Result<AnchorTransaction>;

    async fn remove_issuer(&self, issuer: Address) -> Result<AnchorTransaction>;

    async fn add_verifier(&self, verifier: Address) -> Result<AnchorTransaction>;

    async fn remove_verifier(&self, verifier: Address) -> Result<AnchorTransaction>;

    async fn revoke_hash(&self, digest: [u8; 32]) -> Result<AnchorTransaction>;

    /// `setIssuerInfo(info)` for the signing issuer account.
    async fn set_issuer_info(&self, info: String) -> Result<AnchorTransaction>;

    async fn process_application(
        &self,
        application_id: U256,
        digest: [u8; 32],
        passport_type: String,
    ) -> Result<AnchorTransaction>;
}

/// Submission settings for state-changing calls.
#[derive(Debug, Clone, Copy)]
pub struct SubmitSettings {
    /// Confirmation depth awaited after broadcast
    pub confirmations: usize,
    /// Upper bound on the confirmation wait
    pub confirmation_timeout: Duration,
    /// First block scanned for events
    pub from_block: u64,
    /// Widest block range per `eth_getLogs` request
    pub log_page_size: u64,
}

/// Anchor contract wrapper.
///
/// # Type Parameters
/// * `M` - Middleware stack; a signing middleware is needed for writes
///
/// # Concurrency
/// Broadcasts are serialized through an async mutex so that concurrent
/// requests never race for the issuer's next nonce. Confirmation waits run
/// outside the lock.
pub struct AnchorRegistry<M> {
    /// Generated contract bindings
    contract: AnchorContract<M>,
    settings: SubmitSettings,
    submit_lock: Mutex<()>,
}

impl<M> AnchorRegistry<M>
where
    M: Middleware + 'static,
{
    /// Creates a new AnchorRegistry instance.
    ///
    /// # Arguments
    /// * `contract_address` - Address of the deployed Anchor contract
    /// * `client` - Middleware used for calls and transactions
    /// * `settings` - Confirmation and event-scan settings
    pub fn new(contract_address: Address, client: Arc<M>, settings: SubmitSettings) -> Self {
        Self {
            contract: AnchorContract::new(contract_address, client),
            settings,
            submit_lock: Mutex::new(()),
        }
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    /// Broadcasts `call` and waits for it to be mined with the configured depth.
    ///
    /// Errors are plain strings so each caller can pick its error variant.
    async fn submit(&self, method: &str, call: ContractCall<M, ()>) -> std::result::Result<AnchorTransaction, String> {
        let pending = {
            let _guard = self.submit_lock.lock().await;
            call.send().await.map_err(|e| match e {
                ContractError::Revert(data) => format!("{method} reverted: {data}"),
                other => format!("{method} failed: {other}"),
            })?
        };

        let tx_hash = pending.tx_hash();
        info!("{} broadcast as 0x{:x}", method, tx_hash);

        let receipt = tokio::time::timeout(
            self.settings.confirmation_timeout,
            pending.confirmations(self.settings.confirmations),
        )
        .await
        .map_err(|_| {
            format!(
                "{method} 0x{tx_hash:x} not confirmed within {:?}",
                self.settings.confirmation_timeout
            )
        })?
        .map_err(|e| format!("{method} 0x{tx_hash:x} failed while waiting for confirmation: {e}"))?
        .ok_or_else(|| format!("{method} 0x{tx_hash:x} was dropped from the mempool"))?;

        if receipt.status != Some(U64::from(1)) {
            return Err(format!("{method} 0x{tx_hash:x} reverted on-chain"));
        }

        let block_number = receipt.block_number.map(|b| b.as_u64());
        debug!("{} 0x{:x} confirmed in block {:?}", method, tx_hash, block_number);
        Ok(AnchorTransaction { tx_hash, block_number })
    }

    /// Runs an event query over `from_block..=latest` in windows of at most
    /// `log_page_size` blocks, so providers with a range cap still answer.
    async fn paged_query<D, F>(&self, name: &str, event: F) -> Result<Vec<D>>
    where
        D: EthLogDecode,
        F: Fn() -> Event<Arc<M>, M, D>,
    {
        let latest = self
            .contract
            .client()
            .get_block_number()
            .await
            .map_err(|e| Error::Ledger(format!("{name}: failed to fetch block number: {e}")))?
            .as_u64();
        let page = self.settings.log_page_size.max(1);

        let mut found = Vec::new();
        let mut start = self.settings.from_block;
        while start <= latest {
            let end = latest.min(start.saturating_add(page - 1));
            let events = event()
                .from_block(start)
                .to_block(end)
                .query()
                .await
                .map_err(|e| read_error(name, e))?;
            debug!("{} blocks {}..={}: {} events", name, start, end, events.len());
            found.extend(events);
            start = end + 1;
        }
        Ok(found)
    }

    /// Issuer and timestamp of the newest `logs(i)` entry recording `digest`.
    async fn issuance_log(&self, digest: [u8; 32]) -> Result<Option<(Address, U256)>> {
        let count = self
            .contract
            .get_logs_count()
            .call()
            .await
            .map_err(|e| read_error("getLogsCount", e))?;
        let count = index_value("getLogsCount", count)?;

        for index in (0..count).rev() {
            let (hash, issuer, _, _, timestamp) = self
                .contract
                .logs(U256::from(index))
                .call()
                .await
                .map_err(|e| read_error("logs", e))?;
            if hash == digest {
                return Ok(Some((issuer, timestamp)));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl<M> AnchorLedger for AnchorRegistry<M>
where
    M: Middleware + 'static,
{
    async fn store_hash(&self, digest: [u8; 32]) -> Result<AnchorTransaction> {
        self.submit("storeHash", self.contract.store_hash(digest))
            .await
            .map_err(Error::anchoring)
    }

    async fn is_anchored(&self, digest: [u8; 32]) -> Result<bool> {
        self.contract
            .is_anchored(digest)
            .call()
            .await
            .map_err(|e| read_error("isAnchored", e))
    }

    async fn verify_passport(&self, digest: [u8; 32]) -> Result<PassportVerification> {
        let (is_anchored, is_revoked, issuer, passport_type, issued_at) = self
            .contract
            .verify_passport(digest)
            .call()
            .await
            .map_err(|e| read_error("verifyPassport", e))?;

        Ok(PassportVerification {
            digest: digest_hex(&digest),
            is_anchored,
            is_revoked,
            issuer: (!issuer.is_zero()).then_some(issuer),
            passport_type,
            issued_at: optional_timestamp("verifyPassport.issuedAt", issued_at)?,
        })
    }

    async fn issuer_status(&self, issuer: Address) -> Result<IssuerStatus> {
        let authorized = self
            .contract
            .authorized_issuers(issuer)
            .call()
            .await
            .map_err(|e| read_error("authorizedIssuers", e))?;
        let suspended = self
            .contract
            .suspended_issuers(issuer)
            .call()
            .await
            .map_err(|e| read_error("suspendedIssuers", e))?;
        let info = self
            .contract
            .issuer_info(issuer)
            .call()
            .await
            .map_err(|e| read_error("issuerInfo", e))?;

        Ok(IssuerStatus {
            address: issuer,
            authorized,
            suspended,
            info,
        })
    }

    async fn is_verifier(&self, account: Address) -> Result<bool> {
        self.contract
            .authorized_verifiers(account)
            .call()
            .await
            .map_err(|e| read_error("authorizedVerifiers", e))
    }

    async fn owner(&self) -> Result<Address> {
        self.contract
            .owner()
            .call()
            .await
            .map_err(|e| read_error("owner", e))
    }

    async fn holder_passport(&self, holder: Address) -> Result<HolderPassport> {
        // 1-based; zero means the holder never applied
        let index = self
            .contract
            .application_index(holder)
            .call()
            .await
            .map_err(|e| read_error("applicationIndex", e))?;

        let application = if index.is_zero() {
            None
        } else {
            let id = index - 1;
            let (applicant, cids, processed) = self
                .contract
                .get_application(id)
                .call()
                .await
                .map_err(|e| read_error("getApplication", e))?;
            Some(PassportApplication {
                id: index_value("applicationIndex", id)?,
                applicant,
                cids,
                processed,
            })
        };

        let digest = self
            .contract
            .user_hash(holder)
            .call()
            .await
            .map_err(|e| read_error("userHash", e))?;

        let passport = if digest == [0u8; 32] {
            None
        } else {
            let is_anchored = self
                .contract
                .anchored_hashes(digest)
                .call()
                .await
                .map_err(|e| read_error("anchoredHashes", e))?;
            let is_revoked = self
                .contract
                .revoked_hashes(digest)
                .call()
                .await
                .map_err(|e| read_error("revokedHashes", e))?;
            let passport_type = self
                .contract
                .hash_types(digest)
                .call()
                .await
                .map_err(|e| read_error("hashTypes", e))?;

            let (issuer, issued_at) = match self.issuance_log(digest).await? {
                Some((issuer, timestamp)) => (
                    (!issuer.is_zero()).then_some(issuer),
                    optional_timestamp("logs.timestamp", timestamp)?,
                ),
                None => (None, None),
            };

            Some(HeldPassport {
                digest: digest_hex(&digest),
                passport_type,
                is_anchored,
                is_revoked,
                issuer,
                issued_at,
            })
        };

        Ok(HolderPassport {
            holder,
            application,
            passport,
        })
    }

    async fn anchored_by(&self, issuer: Address) -> Result<Vec<AnchoredCredential>> {
        let events = self
            .paged_query("HashAnchored", || {
                self.contract.hash_anchored_filter().topic2(H256::from(issuer))
            })
            .await?;

        let mut credentials = Vec::with_capacity(events.len());
        for event in events {
            let revoked = self
                .contract
                .has_revoked(event.hash)
                .call()
                .await
                .map_err(|e| read_error("hasRevoked", e))?;
            let anchored_at = optional_timestamp("HashAnchored.timestamp", event.timestamp)?
                .ok_or_else(|| Error::ContractDecode("HashAnchored.timestamp is zero".into()))?;

            credentials.push(AnchoredCredential {
                digest: digest_hex(&event.hash),
                issuer: event.issuer,
                holder: event.user,
                passport_type: event.p_type,
                anchored_at,
                revoked,
            });
        }
        Ok(credentials)
    }

    async fn issuers(&self) -> Result<Vec<Address>> {
        let added: BTreeSet<Address> = self
            .paged_query("IssuerAdded", || self.contract.issuer_added_filter())
            .await?
            .into_iter()
            .map(|event| event.issuer)
            .collect();

        let mut current = Vec::new();
        for issuer in added {
            let authorized = self
                .contract
                .authorized_issuers(issuer)
                .call()
                .await
                .map_err(|e| read_error("authorizedIssuers", e))?;
            if authorized {
                current.push(issuer);
            }
        }
        Ok(current)
    }

    async fn verifiers(&self) -> Result<Vec<Address>> {
        let added: BTreeSet<Address> = self
            .paged_query("VerifierAdded", || self.contract.verifier_added_filter())
            .await?
            .into_iter()
            .map(|event| event.verifier)
            .collect();

        let mut current = Vec::new();
        for verifier in added {
            if self.is_verifier(verifier).await? {
                current.push(verifier);
            }
        }
        Ok(current)
    }

    async fn add_issuer(&self, issuer: Address) -> Result<AnchorTransaction> {
        self.submit("addIssuer", self.contract.add_issuer(issuer))
            .await
            .map_err(Error::Ledger)
    }

    async fn remove_issuer(&self, issuer: Address) -> Result<AnchorTransaction> {
        self.submit("removeIssuer", self.contract.remove_issuer(issuer))
            .await
            .map_err(Error::Ledger)
    }

    async fn add_verifier(&self, verifier: Address) -> Result<AnchorTransaction> {
        self.submit("addVerifier", self.contract.add_verifier(verifier))
            .await
            .map_err(Error::Ledger)
    }

    async fn remove_verifier(&self, verifier: Address) -> Result<AnchorTransaction> {
        self.submit("removeVerifier", self.contract.remove_verifier(verifier))
            .await
            .map_err(Error::Ledger)
    }

    async fn revoke_hash(&self, digest: [u8; 32]) -> Result<AnchorTransaction> {
        self.submit("revokeHash", self.contract.revoke_hash(digest))
            .await
            .map_err(Error::Ledger)
    }

    async fn set_issuer_info(&self, info: String) -> Result<AnchorTransaction> {
        self.submit("setIssuerInfo", self.contract.set_issuer_info(info))
            .await
            .map_err(Error::Ledger)
    }

    async fn process_application(
        &self,
        application_id: U256,
        digest: [u8; 32],
        passport_type: String,
    ) -> Result<AnchorTransaction> {
        self.submit(
            "processApplication",
            self.contract.process_application(application_id, digest, passport_type),
        )
        .await
        .map_err(Error::Ledger)
    }
}

/// Maps a read failure: malformed return data is a decode error, anything else
/// is a ledger error.
fn read_error<M: Middleware>(method: &str, error: ContractError<M>) -> Error {
    match &error {
        ContractError::DecodingError(_) | ContractError::AbiError(_) | ContractError::DetokenizationError(_) => {
            Error::ContractDecode(format!("{method}: {error}"))
        }
        _ => Error::Ledger(format!("{method}: {error}")),
    }
}

/// Narrows a `uint256` index or count.
fn index_value(field: &str, value: U256) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(Error::ContractDecode(format!("{field} out of range: {value}")));
    }
    Ok(value.as_u64())
}

/// Validates a `uint256` Unix timestamp; zero means "unset".
fn optional_timestamp(field: &str, value: U256) -> Result<Option<DateTime<Utc>>> {
    if value.is_zero() {
        return Ok(None);
    }
    if value > U256::from(i64::MAX as u64) {
        return Err(Error::ContractDecode(format!("{field} out of range: {value}")));
    }
    DateTime::from_timestamp(value.as_u64() as i64, 0)
        .map(Some)
        .ok_or_else(|| Error::ContractDecode(format!("{field} out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{encode, Token};
    use ethers::contract::EthEvent;
    use ethers::providers::{MockProvider, Provider};
    use ethers::types::{Block, Bytes, Log, Transaction, TransactionReceipt};
    use serde_json::json;

    const TX: H256 = H256::repeat_byte(0x77);

    fn settings() -> SubmitSettings {
        SubmitSettings {
            confirmations: 1,
            confirmation_timeout: Duration::from_secs(5),
            from_block: 0,
            log_page_size: 2_000,
        }
    }

    fn registry_with(settings: SubmitSettings) -> (AnchorRegistry<Provider<MockProvider>>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        let provider = provider.interval(Duration::from_millis(10));
        let registry = AnchorRegistry::new(Address::repeat_byte(0xaa), Arc::new(provider), settings);
        (registry, mock)
    }

    fn registry() -> (AnchorRegistry<Provider<MockProvider>>, MockProvider) {
        registry_with(settings())
    }

    fn push_return(mock: &MockProvider, tokens: &[Token]) {
        mock.push::<Bytes, _>(Bytes::from(encode(tokens))).unwrap();
    }

    /// Queues the fee estimation, gas estimate and broadcast of one
    /// transaction. Responses pop newest first, so anything the pending
    /// transaction polls afterwards must be pushed before this.
    fn push_broadcast(mock: &MockProvider) {
        mock.push::<H256, _>(TX).unwrap();
        mock.push::<U256, _>(U256::from(60_000u64)).unwrap();
        mock.push::<serde_json::Value, _>(json!({
            "oldestBlock": "0x1",
            "baseFeePerGas": ["0x3b9aca00", "0x3b9aca00"],
            "gasUsedRatio": [0.5],
            "reward": [["0x3b9aca00"]]
        }))
        .unwrap();
        mock.push::<Block<H256>, _>(Block {
            number: Some(U64::from(6)),
            base_fee_per_gas: Some(U256::from(1_000_000_000u64)),
            ..Default::default()
        })
        .unwrap();
    }

    /// Queues a mined transaction followed by its receipt.
    fn push_mined(mock: &MockProvider, status: u64) {
        mock.push::<TransactionReceipt, _>(TransactionReceipt {
            transaction_hash: TX,
            block_number: Some(U64::from(7)),
            status: Some(U64::from(status)),
            ..Default::default()
        })
        .unwrap();
        mock.push::<Transaction, _>(Transaction {
            hash: TX,
            block_number: Some(U64::from(7)),
            ..Default::default()
        })
        .unwrap();
    }

    fn added_log(signature: H256, account: Address) -> Log {
        Log {
            topics: vec![signature, H256::from(account)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_verify_passport_decodes_typed_result() {
        let (registry, mock) = registry();
        let issuer = Address::repeat_byte(0x42);
        mock.push::<Bytes, _>(Bytes::from(encode(&[
            Token::Bool(true),
            Token::Bool(false),
            Token::Address(issuer),
            Token::String("DigitalNomadPassport".into()),
            Token::Uint(U256::from(1_700_000_000u64)),
        ])))
        .unwrap();

        let result = registry.verify_passport([7u8; 32]).await.unwrap();
        assert!(result.is_valid());
        assert_eq!(result.issuer, Some(issuer));
        assert_eq!(result.passport_type, "DigitalNomadPassport");
        assert_eq!(result.issued_at.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(result.digest, digest_hex(&[7u8; 32]));
    }

    #[tokio::test]
    async fn test_unknown_hash_maps_zero_values_to_none() {
        let (registry, mock) = registry();
        mock.push::<Bytes, _>(Bytes::from(encode(&[
            Token::Bool(false),
            Token::Bool(false),
            Token::Address(Address::zero()),
            Token::String(String::new()),
            Token::Uint(U256::zero()),
        ])))
        .unwrap();

        let result = registry.verify_passport([1u8; 32]).await.unwrap();
        assert!(!result.is_valid());
        assert_eq!(result.issuer, None);
        assert_eq!(result.issued_at, None);
    }

    #[tokio::test]
    async fn test_malformed_return_data_is_a_decode_error() {
        let (registry, mock) = registry();
        // A single word where five values are expected
        mock.push::<Bytes, _>(Bytes::from(encode(&[Token::Bool(true)]))).unwrap();

        let err = registry.verify_passport([1u8; 32]).await.unwrap_err();
        assert!(matches!(err, Error::ContractDecode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_is_anchored() {
        let (registry, mock) = registry();
        mock.push::<Bytes, _>(Bytes::from(encode(&[Token::Bool(true)]))).unwrap();
        assert!(registry.is_anchored([3u8; 32]).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_hash_returns_confirmed_transaction() {
        let (registry, mock) = registry();
        push_mined(&mock, 1);
        push_broadcast(&mock);

        let tx = registry.store_hash([9u8; 32]).await.unwrap();
        assert_eq!(tx.tx_hash, TX);
        assert_eq!(tx.block_number, Some(7));
    }

    #[tokio::test]
    async fn test_store_hash_reverted_receipt_is_anchoring_error() {
        let (registry, mock) = registry();
        push_mined(&mock, 0);
        push_broadcast(&mock);

        let err = registry.store_hash([9u8; 32]).await.unwrap_err();
        match err {
            Error::Anchoring { message, pinned } => {
                assert!(message.contains("reverted on-chain"), "{message}");
                assert!(pinned.is_none());
            }
            other => panic!("expected anchoring error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_store_hash_confirmation_timeout_is_anchoring_error() {
        let (registry, mock) = registry_with(SubmitSettings {
            confirmation_timeout: Duration::from_millis(200),
            ..settings()
        });
        // Broadcast succeeds; every later poll fails, so no receipt ever arrives
        push_broadcast(&mock);

        let err = registry.store_hash([9u8; 32]).await.unwrap_err();
        match err {
            Error::Anchoring { message, .. } => assert!(message.contains("not confirmed"), "{message}"),
            other => panic!("expected anchoring error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_store_hash_dropped_transaction_is_anchoring_error() {
        let (registry, mock) = registry_with(SubmitSettings {
            confirmation_timeout: Duration::from_secs(2),
            ..settings()
        });
        for _ in 0..4 {
            mock.push::<Option<Transaction>, _>(None).unwrap();
        }
        push_broadcast(&mock);

        let err = registry.store_hash([9u8; 32]).await.unwrap_err();
        assert!(matches!(err, Error::Anchoring { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_store_hash_send_failure_is_anchoring_error() {
        let (registry, _mock) = registry();

        let err = registry.store_hash([9u8; 32]).await.unwrap_err();
        match err {
            Error::Anchoring { message, .. } => assert!(message.starts_with("storeHash failed"), "{message}"),
            other => panic!("expected anchoring error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_other_writes_fail_as_ledger_errors() {
        let (registry, mock) = registry();
        push_mined(&mock, 0);
        push_broadcast(&mock);

        let err = registry.set_issuer_info("Lisbon consulate".into()).await.unwrap_err();
        assert!(matches!(err, Error::Ledger(ref m) if m.contains("setIssuerInfo")), "got {err:?}");
    }

    #[tokio::test]
    async fn test_holder_passport_decodes_application_and_issuance_log() {
        let (registry, mock) = registry();
        let holder = Address::repeat_byte(0x12);
        let issuer = Address::repeat_byte(0x42);
        let digest = [5u8; 32];

        // Requests run top to bottom; the queue pops the last push first
        let responses = vec![
            vec![Token::Uint(U256::from(3u64))],
            vec![
                Token::Address(holder),
                Token::Array(vec![Token::String("bafkreiapplication".into())]),
                Token::Bool(true),
            ],
            vec![Token::FixedBytes(digest.to_vec())],
            vec![Token::Bool(true)],
            vec![Token::Bool(false)],
            vec![Token::String("DigitalNomadPassport".into())],
            vec![Token::Uint(U256::from(2u64))],
            vec![
                Token::FixedBytes(digest.to_vec()),
                Token::Address(issuer),
                Token::Address(holder),
                Token::String("DigitalNomadPassport".into()),
                Token::Uint(U256::from(1_700_000_000u64)),
            ],
        ];
        for tokens in responses.iter().rev() {
            push_return(&mock, tokens);
        }

        let status = registry.holder_passport(holder).await.unwrap();
        let application = status.application.clone().unwrap();
        assert_eq!(application.id, 2);
        assert_eq!(application.applicant, holder);
        assert_eq!(application.cids, vec!["bafkreiapplication".to_string()]);
        assert!(application.processed);

        let passport = status.passport.clone().unwrap();
        assert_eq!(passport.digest, digest_hex(&digest));
        assert_eq!(passport.passport_type, "DigitalNomadPassport");
        assert_eq!(passport.issuer, Some(issuer));
        assert_eq!(passport.issued_at.unwrap().timestamp(), 1_700_000_000);
        assert!(status.has_valid_passport());
    }

    #[tokio::test]
    async fn test_holder_without_application_or_passport() {
        let (registry, mock) = registry();
        push_return(&mock, &[Token::FixedBytes(vec![0u8; 32])]);
        push_return(&mock, &[Token::Uint(U256::zero())]);

        let status = registry.holder_passport(Address::repeat_byte(0x12)).await.unwrap();
        assert_eq!(status.application, None);
        assert_eq!(status.passport, None);
        assert!(!status.has_valid_passport());
    }

    #[tokio::test]
    async fn test_holder_passport_rejects_malformed_application() {
        let (registry, mock) = registry();
        // One word where (address, string[], bool) is expected
        push_return(&mock, &[Token::Bool(true)]);
        push_return(&mock, &[Token::Uint(U256::one())]);

        let err = registry.holder_passport(Address::repeat_byte(0x12)).await.unwrap_err();
        assert!(matches!(err, Error::ContractDecode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_issuer_listing_pages_the_block_range() {
        let (registry, mock) = registry_with(SubmitSettings {
            log_page_size: 10,
            ..settings()
        });
        let current = Address::repeat_byte(0x31);
        let removed = Address::repeat_byte(0x32);

        // eth_blockNumber, three eth_getLogs windows, then one authorizedIssuers per account
        push_return(&mock, &[Token::Bool(false)]);
        push_return(&mock, &[Token::Bool(true)]);
        mock.push::<Vec<Log>, _>(vec![added_log(IssuerAddedFilter::signature(), removed)]).unwrap();
        mock.push::<Vec<Log>, _>(Vec::new()).unwrap();
        mock.push::<Vec<Log>, _>(vec![added_log(IssuerAddedFilter::signature(), current)]).unwrap();
        mock.push::<U64, _>(U64::from(25)).unwrap();

        let issuers = registry.issuers().await.unwrap();
        assert_eq!(issuers, vec![current]);
    }

    #[test]
    fn test_timestamp_validation() {
        assert_eq!(optional_timestamp("t", U256::zero()).unwrap(), None);
        assert_eq!(
            optional_timestamp("t", U256::from(86_400u64)).unwrap().unwrap().timestamp(),
            86_400
        );
        assert!(matches!(
            optional_timestamp("t", U256::MAX),
            Err(Error::ContractDecode(_))
        ));
    }
}
