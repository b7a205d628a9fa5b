pub mod anchor_submitter;
pub mod api_server;
pub mod credential_issuer;
pub mod issuance_pipeline;
pub mod verifier;
