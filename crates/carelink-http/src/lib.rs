//! Carelink HTTP - Credential lifecycle and resilient request pipeline
//!
//! Provides an async client for a backend protected by an identity provider:
//! - Bearer credential acquisition with caching, single-flight deduplication
//!   and proactive renewal
//! - Anti-forgery token attachment on state-changing requests
//! - Per-request timeouts
//! - Bounded, jittered exponential backoff on HTTP 429
//!
//! ## Modules
//!
//! - [`credentials`] - Credential lifecycle manager
//! - [`backoff`] - Retry eligibility and delay computation
//! - [`request`] - Per-call request options
//! - [`client`] - The request pipeline ([`ApiClient`])

pub mod backoff;
pub mod client;
pub mod credentials;
pub mod request;

pub use carelink_core::domain::{ApiError, ConfigError};
pub use client::ApiClient;
pub use credentials::{CredentialError, CredentialManager};
pub use request::RequestOptions;
pub use reqwest::Method;

use thiserror::Error;

/// Errors returned by [`ApiClient`] requests
///
/// Configuration problems are kept apart from request failures so the host
/// can tell "the app is misconfigured" from "this call failed".
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    /// The backend base URL is missing or unacceptable for this deployment
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The request itself failed
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ClientError {
    /// Machine-readable code; `CONFIGURATION_ERROR` for configuration failures
    pub fn code(&self) -> String {
        match self {
            ClientError::Config(_) => "CONFIGURATION_ERROR".to_string(),
            ClientError::Api(e) => e.code(),
        }
    }

    /// Returns the request failure, if this is one
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            ClientError::Api(e) => Some(e),
            ClientError::Config(_) => None,
        }
    }

    /// Returns true for configuration failures
    pub fn is_config(&self) -> bool {
        matches!(self, ClientError::Config(_))
    }
}
