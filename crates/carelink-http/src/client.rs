//! Backend API client
//!
//! [`ApiClient`] runs every logical request through the same pipeline:
//!
//! 1. Resolve the base URL (validated once per client, see
//!    [`carelink_core::config::BaseUrl`]) and join the endpoint and query
//! 2. Attach the anti-forgery header on state-changing methods
//! 3. Attach a bearer credential from the [`CredentialManager`]
//! 4. Send under a per-request deadline covering the whole exchange
//! 5. On HTTP 429, back off and retry up to the configured limit
//! 6. Decode the body and map failures into [`ApiError`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use carelink_core::config::ClientConfig;
//! use carelink_http::{ApiClient, RequestOptions};
//!
//! # async fn example() -> Result<(), carelink_http::ClientError> {
//! let client = ApiClient::new(&ClientConfig::default());
//! let patient: serde_json::Value = client.get("/patients/42", RequestOptions::new()).await?;
//! println!("{patient}");
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use carelink_core::{
    config::{AuthConfig, BaseUrl, ClientConfig, DeploymentMode},
    domain::{ApiError, ConfigError},
    ports::{CsrfStore, ICsrfTokenSource, IIdentityProvider},
};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, RequestBuilder, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    backoff::{retry_after_from_headers, BackoffPolicy, RetryPlan},
    credentials::CredentialManager,
    request::{is_state_changing, RequestOptions},
    ClientError,
};

/// Header carrying the anti-forgery token, in both directions
pub const CSRF_HEADER: &str = "x-csrf-token";

// ============================================================================
// ApiClient
// ============================================================================

/// HTTP client for the backend API
///
/// Cheap to share behind an `Arc`; all per-request state lives on the stack
/// of [`ApiClient::request`].
pub struct ApiClient {
    http: Client,
    base_url: BaseUrl,
    deployment: DeploymentMode,
    auth: AuthConfig,
    credentials: Option<CredentialManager>,
    csrf_source: Arc<dyn ICsrfTokenSource>,
    csrf_store: CsrfStore,
    default_timeout: Duration,
    max_retries: u32,
    backoff: BackoffPolicy,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("deployment", &self.deployment)
            .field("credentials", &self.credentials)
            .field("default_timeout", &self.default_timeout)
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client from configuration
    ///
    /// The base URL is not validated here; the first request (or
    /// [`ApiClient::base_url`]) does that and reports a
    /// [`ClientError::Config`] if it is unacceptable.
    pub fn new(config: &ClientConfig) -> Self {
        let csrf_store = CsrfStore::new();
        Self {
            http: Client::new(),
            base_url: BaseUrl::new(config.api.base_url.clone(), config.deployment),
            deployment: config.deployment,
            auth: config.auth.clone(),
            credentials: None,
            csrf_source: Arc::new(csrf_store.clone()),
            csrf_store,
            default_timeout: Duration::from_millis(config.api.timeout_ms),
            max_retries: config.api.max_retries,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Attaches an identity provider, creating a [`CredentialManager`] with
    /// the configured scopes and renewal margin
    pub fn with_identity_provider(mut self, provider: Arc<dyn IIdentityProvider>) -> Self {
        self.credentials = Some(CredentialManager::with_renewal_margin(
            provider,
            self.auth.scopes.clone(),
            Duration::from_secs(self.auth.renewal_margin_secs),
        ));
        self
    }

    /// Uses an existing credential manager (e.g. one shared with other clients)
    pub fn with_credential_manager(mut self, manager: CredentialManager) -> Self {
        self.credentials = Some(manager);
        self
    }

    /// Reads anti-forgery tokens from `source` instead of the built-in store
    pub fn with_csrf_source(mut self, source: Arc<dyn ICsrfTokenSource>) -> Self {
        self.csrf_source = source;
        self
    }

    /// Uses a pre-configured reqwest client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Overrides the 429 backoff parameters
    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = policy;
        self
    }

    /// Overrides the configured number of 429 retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Overrides the configured default timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Resolved base URL, validating it on first use
    pub fn base_url(&self) -> Result<&Url, ConfigError> {
        self.base_url.get()
    }

    pub fn deployment(&self) -> DeploymentMode {
        self.deployment
    }

    /// Token slot updated from `X-CSRF-Token` response headers
    pub fn csrf_store(&self) -> &CsrfStore {
        &self.csrf_store
    }

    pub fn credentials(&self) -> Option<&CredentialManager> {
        self.credentials.as_ref()
    }

    /// Cancels pending credential renewal
    pub fn shutdown(&self) {
        if let Some(manager) = &self.credentials {
            manager.shutdown();
        }
    }

    // ========================================================================
    // Convenience verbs
    // ========================================================================

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        self.request(Method::GET, endpoint, options).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        self.request(Method::POST, endpoint, with_body(options, body)?)
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        self.request(Method::PUT, endpoint, with_body(options, body)?)
            .await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        self.request(Method::PATCH, endpoint, with_body(options, body)?)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        self.request(Method::DELETE, endpoint, options).await
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    /// Executes one logical request and decodes the response body into `T`
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let url = self.build_url(endpoint, &options.query)?;

        match self.execute(&method, url, &options).await {
            Ok(body) => decode(body).map_err(|e| {
                self.report_failure(&method, endpoint, &e);
                ClientError::Api(e)
            }),
            Err(e) => {
                self.report_failure(&method, endpoint, &e);
                Err(ClientError::Api(e))
            }
        }
    }

    /// Sends the request, retrying on 429, and returns the decoded body of
    /// a 2xx response
    async fn execute(
        &self,
        method: &Method,
        url: Url,
        options: &RequestOptions,
    ) -> Result<Value, ApiError> {
        let max_retries = if options.skip_rate_limit_retry {
            0
        } else {
            self.max_retries
        };
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let body = options
            .body
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| ApiError::unknown(format!("Failed to encode request body: {e}")))?;

        let mut attempt: u32 = 0;
        loop {
            let headers = self.build_headers(method, options).await?;
            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .headers(headers);
            if let Some(body) = &body {
                builder = builder.body(body.clone());
            }

            let response = self.send(builder, timeout).await?;

            if response.status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = retry_after_from_headers(&response.headers);
                let plan = RetryPlan::evaluate(
                    &self.backoff,
                    response.status,
                    attempt,
                    max_retries,
                    retry_after,
                );

                if !plan.should_retry {
                    warn!(
                        path = url.path(),
                        attempts = attempt + 1,
                        "429 retry limit exhausted"
                    );
                    return Err(ApiError::RateLimited {
                        retry_after_seconds: retry_after.map(|d| d.as_secs()),
                    });
                }

                info!(
                    path = url.path(),
                    attempt,
                    delay_ms = plan.delay.as_millis() as u64,
                    "Received 429, backing off"
                );
                tokio::time::sleep(plan.delay).await;
                attempt += 1;
                continue;
            }

            self.capture_csrf(&response.headers);

            let value = parse_body(&response.headers, &response.body);
            if !response.status.is_success() {
                return Err(ApiError::from_response_body(
                    response.status.as_u16(),
                    response.status.canonical_reason().unwrap_or(""),
                    value.as_ref().ok(),
                ));
            }
            return value;
        }
    }

    /// Sends one attempt and reads its body, all under `timeout`
    async fn send(
        &self,
        builder: RequestBuilder,
        timeout: Duration,
    ) -> Result<RawResponse, ApiError> {
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>(RawResponse {
                status,
                headers,
                body,
            })
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_timeout() => Err(ApiError::Timeout { timeout }),
            Ok(Err(e)) => Err(ApiError::unknown(format!("Network error: {e}"))),
            Err(_) => Err(ApiError::Timeout { timeout }),
        }
    }

    /// Default headers, then CSRF and bearer credential, then caller overrides
    async fn build_headers(
        &self,
        method: &Method,
        options: &RequestOptions,
    ) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Checked before the credential so a refused request does no I/O at all
        if is_state_changing(method) {
            match self.csrf_source.csrf_token() {
                Some(token) => {
                    let value = HeaderValue::from_str(&token)
                        .map_err(|_| ApiError::unknown("CSRF token is not a valid header value"))?;
                    headers.insert(HeaderName::from_static(CSRF_HEADER), value);
                }
                None if self.deployment.is_production() => {
                    return Err(ApiError::CsrfTokenMissing);
                }
                None => {
                    warn!(%method, "No CSRF token available; sending without it");
                }
            }
        }

        if options.requires_auth {
            match self.bearer_token(options.scopes.as_deref()).await {
                Ok(token) => {
                    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                        .map_err(|_| ApiError::unknown("Credential is not a valid header value"))?;
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(reason) if options.allow_anonymous => {
                    warn!(%reason, "No credential available; sending unauthenticated");
                }
                Err(reason) => {
                    return Err(ApiError::unknown(format!(
                        "Failed to acquire credential: {reason}"
                    )));
                }
            }
        }

        for (name, value) in options.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        Ok(headers)
    }

    async fn bearer_token(&self, scopes: Option<&[String]>) -> Result<String, String> {
        match &self.credentials {
            Some(manager) => manager
                .get_credential(scopes)
                .await
                .map_err(|e| e.to_string()),
            None => Err("no identity provider configured".to_string()),
        }
    }

    fn capture_csrf(&self, headers: &HeaderMap) {
        if let Some(token) = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) {
            debug!("Received refreshed CSRF token");
            self.csrf_store.set(token);
        }
    }

    fn build_url(&self, endpoint: &str, query: &[(String, String)]) -> Result<Url, ClientError> {
        let base = self.base_url.get()?;
        join_url(base, endpoint, query).map_err(ClientError::Api)
    }

    fn report_failure(&self, method: &Method, endpoint: &str, error: &ApiError) {
        if self.deployment.is_production() {
            warn!(
                %method,
                endpoint,
                code = %error.code(),
                status = error.status_code(),
                "API request failed"
            );
        } else {
            warn!(
                %method,
                endpoint,
                code = %error.code(),
                status = error.status_code(),
                error = ?error,
                "API request failed"
            );
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

fn with_body<B: Serialize + ?Sized>(
    options: RequestOptions,
    body: &B,
) -> Result<RequestOptions, ClientError> {
    let value = serde_json::to_value(body)
        .map_err(|e| ApiError::unknown(format!("Failed to encode request body: {e}")))?;
    Ok(options.body(value))
}

/// Joins `endpoint` onto `base` by concatenation and appends `query`
pub(crate) fn join_url(
    base: &Url,
    endpoint: &str,
    query: &[(String, String)],
) -> Result<Url, ApiError> {
    let base = base.as_str().trim_end_matches('/');
    let joined = if endpoint.is_empty() || endpoint.starts_with('/') {
        format!("{base}{endpoint}")
    } else {
        format!("{base}/{endpoint}")
    };

    let mut url = Url::parse(&joined)
        .map_err(|e| ApiError::unknown(format!("Invalid endpoint '{endpoint}': {e}")))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }
    Ok(url)
}

/// Reads a response body as JSON when the content type says so, else as text.
///
/// An empty body is `null`. A body that claims JSON but does not parse is an
/// error; callers building error values fall back to the status text.
fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<Value, ApiError> {
    if body.is_empty() {
        return Ok(Value::Null);
    }

    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_slice(body)
            .map_err(|e| ApiError::unknown(format!("Failed to parse response body: {e}")))
    } else {
        Ok(Value::String(String::from_utf8_lossy(body).into_owned()))
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body)
        .map_err(|e| ApiError::unknown(format!("Failed to decode response body: {e}")))
}
