//! Per-call request options
//!
//! A [`RequestOptions`] value is built fresh for every logical request and
//! never shared; the pipeline only reads it.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;

/// Everything about a request besides its method and endpoint
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<Value>,
    pub(crate) headers: HeaderMap,
    pub(crate) timeout: Option<Duration>,
    pub(crate) requires_auth: bool,
    pub(crate) allow_anonymous: bool,
    pub(crate) skip_rate_limit_retry: bool,
    pub(crate) scopes: Option<Vec<String>>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            timeout: None,
            requires_auth: true,
            allow_anonymous: true,
            skip_rate_limit_retry: false,
            scopes: None,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a query parameter; the value is string-encoded
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Appends a query parameter only when `value` is present
    pub fn query_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Sets the JSON request body
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds or overrides a request header (applied after the defaults)
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Overrides the client's default timeout for this call
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sends the request without an `Authorization` header
    pub fn anonymous(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    /// Fails the request instead of sending it unauthenticated when no
    /// credential can be obtained
    pub fn require_credential(mut self) -> Self {
        self.allow_anonymous = false;
        self
    }

    /// Surfaces the first 429 as `RATE_LIMITED` without local retries
    pub fn skip_rate_limit_retry(mut self) -> Self {
        self.skip_rate_limit_retry = true;
        self
    }

    /// Requests a credential for these scopes instead of the client defaults
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }
}

/// Methods that change server state and therefore carry an anti-forgery token
pub fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
