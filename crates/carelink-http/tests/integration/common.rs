//! Shared test helpers for ApiClient integration tests
//!
//! Provides a scripted identity provider and wiremock-backed client setup.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use carelink_core::config::{ClientConfig, ClientConfigBuilder, DeploymentMode};
use carelink_core::domain::{Account, Credential};
use carelink_core::ports::{IIdentityProvider, IdentityError};
use carelink_http::backoff::BackoffPolicy;
use carelink_http::ApiClient;
use chrono::Utc;
use wiremock::MockServer;

pub const TEST_TOKEN: &str = "test-access-token";

/// Identity provider that hands out a fixed token after a short delay
pub struct TestProvider {
    token: Option<String>,
    latency: Duration,
    calls: AtomicUsize,
}

impl TestProvider {
    pub fn issuing(token: &str) -> Arc<Self> {
        Arc::new(Self {
            token: Some(token.to_string()),
            latency: Duration::from_millis(50),
            calls: AtomicUsize::new(0),
        })
    }

    /// A provider with no signed-in account
    pub fn signed_out() -> Arc<Self> {
        Arc::new(Self {
            token: None,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn issue(&self) -> Result<Credential, IdentityError> {
        tokio::time::sleep(self.latency).await;
        match &self.token {
            Some(token) => Ok(Credential::new(
                token.clone(),
                Utc::now() + chrono::Duration::hours(1),
            )),
            None => Err(IdentityError::NoActiveAccount),
        }
    }
}

#[async_trait]
impl IIdentityProvider for TestProvider {
    fn active_account(&self) -> Option<Account> {
        self.token.as_ref().map(|_| Account::new("account-1"))
    }

    async fn acquire_token_silent(
        &self,
        _scopes: &[String],
        _account: Option<&Account>,
    ) -> Result<Credential, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.issue().await
    }

    async fn acquire_token_interactive(
        &self,
        _scopes: &[String],
    ) -> Result<Credential, IdentityError> {
        Err(IdentityError::InteractiveUnavailable(
            "no interactive surface in tests".to_string(),
        ))
    }
}

/// Configuration pointing at the mock server in development mode
pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfigBuilder::new()
        .base_url(server.uri())
        .deployment(DeploymentMode::Development)
        .scopes(["api://carelink/.default"])
        .build()
}

/// Backoff short enough to exhaust retries quickly in tests
pub fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        base: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        jitter_ratio: 0.2,
    }
}

/// Starts a mock server and returns it with an authenticated client
pub async fn setup() -> (MockServer, ApiClient, Arc<TestProvider>) {
    let server = MockServer::start().await;
    let provider = TestProvider::issuing(TEST_TOKEN);
    let client = ApiClient::new(&config_for(&server)).with_identity_provider(provider.clone());
    (server, client, provider)
}

/// Number of requests the mock server has seen
pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}
