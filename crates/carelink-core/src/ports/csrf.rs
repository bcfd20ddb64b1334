//! Anti-forgery token sources
//!
//! State-changing requests carry an `X-CSRF-Token` header. Where that token
//! comes from is up to the host (a cookie, a bootstrap payload, a response
//! header), so the request pipeline reads it through [`ICsrfTokenSource`]
//! on every attempt.

use std::sync::{Arc, RwLock};

/// Port trait for reading the current anti-forgery token
pub trait ICsrfTokenSource: Send + Sync {
    /// Returns the current token, or `None` if none is available
    fn csrf_token(&self) -> Option<String>;
}

impl<F> ICsrfTokenSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn csrf_token(&self) -> Option<String> {
        self()
    }
}

/// A fixed token known up front
#[derive(Debug, Clone)]
pub struct StaticCsrfToken(String);

impl StaticCsrfToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl ICsrfTokenSource for StaticCsrfToken {
    fn csrf_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// A shared, updatable token slot
///
/// Cloning yields a handle to the same slot. The HTTP client writes into it
/// whenever a response carries a fresh `X-CSRF-Token` header, and the host
/// may also set it directly (e.g. from a bootstrap call).
#[derive(Debug, Clone, Default)]
pub struct CsrfStore {
    token: Arc<RwLock<Option<String>>>,
}

impl CsrfStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `token`
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(token);
        store
    }

    /// Replaces the stored token; empty values clear it
    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        let mut slot = self.token.write().unwrap_or_else(|e| e.into_inner());
        *slot = if token.trim().is_empty() {
            None
        } else {
            Some(token)
        };
    }

    /// Clears the stored token (e.g. on sign-out)
    pub fn clear(&self) {
        let mut slot = self.token.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}

impl ICsrfTokenSource for CsrfStore {
    fn csrf_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
