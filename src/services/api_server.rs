// src/services/api_server.rs
//! API Server for the Digital Nomad Passport issuer
//!
//! This module provides the REST API in front of the issuance pipeline and the
//! Anchor contract. The API is built using Axum and includes endpoints for:
//! - Credential issuance (build, pin, anchor) and re-anchoring of pinned credentials
//! - Credential and passport verification
//! - Issuer and verifier registry management
//! - Revocation and application processing
//!
//! Every state-changing route requires `Authorization: Bearer <API_TOKEN>`.
//! Registry management is signed with the contract owner key and is only
//! available when one is configured. Cross-origin browser access is limited
//! to the configured origins.

use crate::contracts::anchor_registry::{AnchorLedger, AnchorTransaction};
use crate::error::Error;
use crate::models::credential::{ContentRecord, IssuanceReceipt, PassportClaims, ReanchorOutcome};
use crate::models::did::parse_address;
use crate::models::passport::{AnchoredCredential, HolderPassport, IssuerStatus, PassportVerification};
use crate::services::issuance_pipeline::IssuancePipeline;
use crate::services::verifier::{CredentialReport, Verifier};
use crate::utils::crypto::{hash_data, parse_digest};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Json, Path, State},
    http::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE},
    http::request::Parts,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use ethers::types::{Address, U256};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

// API request and response structures

/// Request payload for issuing a passport credential
#[derive(Serialize, Deserialize)]
struct IssueVcRequest {
    /// Holder account address
    #[serde(alias = "holder")]
    address: String,
    claims: PassportClaims,
}

/// Request payload for re-anchoring a pinned credential
#[derive(Serialize, Deserialize)]
struct ReanchorRequest {
    cid: String,
}

/// Request payload for verifying a compact credential
#[derive(Serialize, Deserialize)]
struct VerifyCredentialRequest {
    #[serde(alias = "jwt")]
    vc_jwt: String,
}

/// Response for credential verification
#[derive(Serialize, Deserialize)]
struct VerifyCredentialResponse {
    is_valid: bool,
    #[serde(flatten)]
    report: serde_json::Value,
}

/// Request payload naming an issuer or verifier account
#[derive(Serialize, Deserialize)]
struct AccountRequest {
    address: String,
}

/// Request payload for revoking an anchored hash
#[derive(Serialize, Deserialize)]
struct RevokeHashRequest {
    hash: String,
}

/// Request payload for approving a passport application
#[derive(Serialize, Deserialize)]
struct ProcessApplicationRequest {
    hash: String,
    #[serde(alias = "pType")]
    passport_type: String,
}

/// Request payload for publishing the signing issuer's description
#[derive(Serialize, Deserialize)]
struct IssuerInfoRequest {
    info: String,
}

/// Response for every state-changing operation
#[derive(Serialize, Deserialize)]
struct TransactionResponse {
    tx_hash: String,
    block_number: Option<u64>,
}

impl From<AnchorTransaction> for TransactionResponse {
    fn from(tx: AnchorTransaction) -> Self {
        Self {
            tx_hash: format!("0x{:x}", tx.tx_hash),
            block_number: tx.block_number,
        }
    }
}

/// Response listing registry accounts
#[derive(Serialize, Deserialize)]
struct AccountsResponse {
    accounts: Vec<Address>,
}

/// Response for the contract owner query
#[derive(Serialize, Deserialize)]
struct OwnerResponse {
    owner: Address,
}

/// Error body: `{"error": "...", "pinned": {...}}`
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pinned: Option<ContentRecord>,
}

/// Maps a service error onto an HTTP response.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidHolderAddress(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Credential(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::PinningService { .. }
            | Error::Anchoring { .. }
            | Error::Ledger(_)
            | Error::ContractDecode(_) => StatusCode::BAD_GATEWAY,
            Error::IssuerConfiguration(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
            pinned: self.0.pinned().cloned(),
        };
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Caller authentication and browser access policy.
pub struct ApiAccess {
    /// Keccak-256 of the bearer token; the token itself is not kept
    token_digest: [u8; 32],
    allowed_origins: Vec<HeaderValue>,
}

impl ApiAccess {
    /// # Errors
    /// [`Error::InvalidInput`] if an origin is not a valid header value.
    pub fn new(api_token: &str, allowed_origins: &[String]) -> Result<Self, Error> {
        let allowed_origins = allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|_| Error::InvalidInput(format!("not a valid origin: {origin}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            token_digest: hash_data(api_token.trim().as_bytes()),
            allowed_origins,
        })
    }

    /// CORS for the configured origins only; `None` leaves the API same-origin.
    fn cors(&self) -> Option<CorsLayer> {
        if self.allowed_origins.is_empty() {
            return None;
        }
        Some(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(self.allowed_origins.clone()))
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE]),
        )
    }

    fn accepts(&self, token: &str) -> bool {
        // Digests are compared so timing does not follow the token's prefix
        hash_data(token.trim().as_bytes()) == self.token_digest
    }
}

/// Extractor guarding state-changing handlers with the API bearer token.
struct Authorized;

#[async_trait]
impl FromRequestParts<Arc<ApiServer>> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<ApiServer>) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError(Error::Unauthorized("missing bearer token".into())))?;

        if !state.access.accepts(token) {
            return Err(ApiError(Error::Unauthorized("invalid bearer token".into())));
        }
        Ok(Authorized)
    }
}

/// API server state containing all service dependencies
pub struct ApiServer {
    /// Builder → Pinner → Submitter pipeline
    pipeline: IssuancePipeline,

    /// Service for verifying credentials
    verifier: Verifier,

    /// Anchor contract client signing as the issuer
    ledger: Arc<dyn AnchorLedger>,

    /// Anchor contract client signing as the contract owner
    owner_ledger: Option<Arc<dyn AnchorLedger>>,

    access: ApiAccess,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `pipeline` - Issuance pipeline
    /// * `verifier` - Credential verification service
    /// * `ledger` - Issuer-signed Anchor contract client
    /// * `access` - Bearer token and allowed browser origins
    pub fn new(pipeline: IssuancePipeline, verifier: Verifier, ledger: Arc<dyn AnchorLedger>, access: ApiAccess) -> Self {
        ApiServer {
            pipeline,
            verifier,
            ledger,
            owner_ledger: None,
            access,
        }
    }

    /// Enables issuer and verifier management, signed by the contract owner.
    pub fn with_owner_ledger(mut self, owner_ledger: Arc<dyn AnchorLedger>) -> Self {
        self.owner_ledger = Some(owner_ledger);
        self
    }

    /// Builds the route table over shared server state.
    pub fn router(self: Arc<Self>) -> Router {
        let cors = self.access.cors();
        let router = Router::new()
            .route("/issue-vc", post(Self::issue_vc_handler))
            .route("/reanchor", post(Self::reanchor_handler))
            .route("/verify-credential", post(Self::verify_credential_handler))
            .route("/verify-passport/:hash", get(Self::verify_passport_handler))
            .route("/holders/:address/passport", get(Self::holder_passport_handler))
            .route("/issuers", get(Self::list_issuers_handler).post(Self::add_issuer_handler))
            .route("/issuers/info", put(Self::set_issuer_info_handler))
            .route("/issuers/:address", get(Self::issuer_status_handler).delete(Self::remove_issuer_handler))
            .route("/issuers/:address/credentials", get(Self::issuer_credentials_handler))
            .route("/verifiers", get(Self::list_verifiers_handler).post(Self::add_verifier_handler))
            .route("/verifiers/:address", delete(Self::remove_verifier_handler))
            .route("/revoke-hash", post(Self::revoke_hash_handler))
            .route("/applications/:id/process", post(Self::process_application_handler))
            .route("/owner", get(Self::owner_handler));

        let router = match cors {
            Some(cors) => router.layer(cors),
            None => router,
        };
        router.with_state(self)
    }

    fn owner_ledger(&self) -> Result<&Arc<dyn AnchorLedger>, ApiError> {
        self.owner_ledger.as_ref().ok_or_else(|| {
            ApiError(Error::Forbidden(
                "registry management is disabled; set OWNER_PRIVATE_KEY to the contract owner key".into(),
            ))
        })
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(self: Arc<Self>, addr: SocketAddr) -> std::io::Result<()> {
        let app = self.router();

        // Create TCP listener
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on http://{}", listener.local_addr()?);

        // Start serving requests
        axum::serve(listener, app).await
    }

    // =====================
    // Issuance Handlers
    // =====================

    /// Issues, pins and anchors a passport credential
    ///
    /// # Endpoint
    /// POST /issue-vc
    ///
    /// # Responses
    /// - 200 OK: Returns the issuance receipt
    /// - 400 Bad Request: Malformed holder address
    /// - 401 Unauthorized: Missing or wrong bearer token
    /// - 502 Bad Gateway: Pinning or anchoring failed (`pinned` set if the credential was pinned)
    async fn issue_vc_handler(
        _auth: Authorized,
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<IssueVcRequest>,
    ) -> ApiResult<IssuanceReceipt> {
        let receipt = state.pipeline.issue(&payload.address, payload.claims).await?;
        Ok(Json(receipt))
    }

    /// Anchors an already pinned credential if it is not yet on the ledger
    ///
    /// # Endpoint
    /// POST /reanchor
    async fn reanchor_handler(
        _auth: Authorized,
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<ReanchorRequest>,
    ) -> ApiResult<ReanchorOutcome> {
        Ok(Json(state.pipeline.reanchor(payload.cid.trim()).await?))
    }

    // =====================
    // Verification Handlers
    // =====================

    /// Verifies a compact credential's signature and on-chain status
    ///
    /// # Endpoint
    /// POST /verify-credential
    ///
    /// # Responses
    /// - 200 OK: Returns the verification report
    /// - 422 Unprocessable Entity: Malformed token or signature mismatch
    async fn verify_credential_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<VerifyCredentialRequest>,
    ) -> ApiResult<VerifyCredentialResponse> {
        let report: CredentialReport = state.verifier.verify_credential(&payload.vc_jwt).await?;
        Ok(Json(VerifyCredentialResponse {
            is_valid: report.is_valid(),
            report: serde_json::to_value(&report).map_err(Error::from)?,
        }))
    }

    /// Looks up a passport digest on the Anchor contract
    ///
    /// # Endpoint
    /// GET /verify-passport/:hash
    async fn verify_passport_handler(
        Path(hash): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<PassportVerification> {
        Ok(Json(state.verifier.passport_status(&hash).await?))
    }

    /// Application and passport state recorded for a holder
    ///
    /// # Endpoint
    /// GET /holders/:address/passport
    async fn holder_passport_handler(
        Path(address): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<HolderPassport> {
        Ok(Json(state.verifier.holder_passport(&address).await?))
    }

    // =====================
    // Registry Handlers
    // =====================

    /// Currently authorized issuers
    ///
    /// # Endpoint
    /// GET /issuers
    async fn list_issuers_handler(State(state): State<Arc<ApiServer>>) -> ApiResult<AccountsResponse> {
        Ok(Json(AccountsResponse {
            accounts: state.ledger.issuers().await?,
        }))
    }

    /// # Endpoint
    /// GET /issuers/:address
    async fn issuer_status_handler(
        Path(address): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<IssuerStatus> {
        Ok(Json(state.verifier.issuer_status(&address).await?))
    }

    /// Credentials anchored by one issuer
    ///
    /// # Endpoint
    /// GET /issuers/:address/credentials
    async fn issuer_credentials_handler(
        Path(address): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<Vec<AnchoredCredential>> {
        Ok(Json(state.verifier.issued_by(&address).await?))
    }

    /// Publishes the issuer description, signed by the issuer key
    ///
    /// # Endpoint
    /// PUT /issuers/info
    async fn set_issuer_info_handler(
        _auth: Authorized,
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<IssuerInfoRequest>,
    ) -> ApiResult<TransactionResponse> {
        let info = payload.info.trim();
        if info.is_empty() {
            return Err(Error::InvalidInput("info must not be empty".into()).into());
        }
        Ok(Json(state.ledger.set_issuer_info(info.to_string()).await?.into()))
    }

    /// Authorizes an issuer, signed by the contract owner key
    ///
    /// # Endpoint
    /// POST /issuers
    async fn add_issuer_handler(
        _auth: Authorized,
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<AccountRequest>,
    ) -> ApiResult<TransactionResponse> {
        let issuer = account(&payload.address)?;
        Ok(Json(state.owner_ledger()?.add_issuer(issuer).await?.into()))
    }

    /// # Endpoint
    /// DELETE /issuers/:address
    async fn remove_issuer_handler(
        _auth: Authorized,
        Path(address): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<TransactionResponse> {
        let issuer = account(&address)?;
        Ok(Json(state.owner_ledger()?.remove_issuer(issuer).await?.into()))
    }

    /// Currently authorized verifiers
    ///
    /// # Endpoint
    /// GET /verifiers
    async fn list_verifiers_handler(State(state): State<Arc<ApiServer>>) -> ApiResult<AccountsResponse> {
        Ok(Json(AccountsResponse {
            accounts: state.ledger.verifiers().await?,
        }))
    }

    /// Authorizes a verifier, signed by the contract owner key
    ///
    /// # Endpoint
    /// POST /verifiers
    async fn add_verifier_handler(
        _auth: Authorized,
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<AccountRequest>,
    ) -> ApiResult<TransactionResponse> {
        let verifier = account(&payload.address)?;
        Ok(Json(state.owner_ledger()?.add_verifier(verifier).await?.into()))
    }

    /// # Endpoint
    /// DELETE /verifiers/:address
    async fn remove_verifier_handler(
        _auth: Authorized,
        Path(address): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<TransactionResponse> {
        let verifier = account(&address)?;
        Ok(Json(state.owner_ledger()?.remove_verifier(verifier).await?.into()))
    }

    /// # Endpoint
    /// POST /revoke-hash
    async fn revoke_hash_handler(
        _auth: Authorized,
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<RevokeHashRequest>,
    ) -> ApiResult<TransactionResponse> {
        let digest = digest(&payload.hash)?;
        Ok(Json(state.ledger.revoke_hash(digest).await?.into()))
    }

    /// Approves a pending passport application and anchors its hash
    ///
    /// # Endpoint
    /// POST /applications/:id/process
    async fn process_application_handler(
        _auth: Authorized,
        Path(id): Path<String>,
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<ProcessApplicationRequest>,
    ) -> ApiResult<TransactionResponse> {
        let application_id = U256::from_dec_str(id.trim())
            .map_err(|_| Error::InvalidInput(format!("application id must be a decimal integer: {id}")))?;
        let digest = digest(&payload.hash)?;
        if payload.passport_type.trim().is_empty() {
            return Err(Error::InvalidInput("passport_type must not be empty".into()).into());
        }

        let tx = state
            .ledger
            .process_application(application_id, digest, payload.passport_type)
            .await?;
        Ok(Json(tx.into()))
    }

    /// # Endpoint
    /// GET /owner
    async fn owner_handler(State(state): State<Arc<ApiServer>>) -> ApiResult<OwnerResponse> {
        Ok(Json(OwnerResponse {
            owner: state.ledger.owner().await?,
        }))
    }
}

fn account(value: &str) -> Result<Address, ApiError> {
    parse_address(value).map_err(|_| ApiError(Error::InvalidInput(format!("not an address: {value}"))))
}

fn digest(value: &str) -> Result<[u8; 32], ApiError> {
    parse_digest(value).ok_or_else(|| ApiError(Error::InvalidInput(format!("not a 32-byte hex digest: {value}"))))
}
