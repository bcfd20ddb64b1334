//! Error taxonomy
//!
//! Two separate categories live here:
//!
//! - [`ApiError`] - the flat, exhaustive set of request failures surfaced to
//!   every caller of the request pipeline. Each variant maps to exactly one
//!   wire-level `code` string (`HTTP_<status>`, `TIMEOUT`, `RATE_LIMITED`,
//!   `CSRF_TOKEN_MISSING`, `UNKNOWN`).
//! - [`ConfigError`] - fatal configuration problems detected while resolving
//!   the backend base URL. These are never folded into `ApiError` so that a
//!   host can render a distinct "misconfigured" state.

use std::time::Duration;

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Status code reported for client-side timeouts
pub const TIMEOUT_STATUS: u16 = 408;

/// Status code reported when the anti-forgery token is missing
pub const CSRF_MISSING_STATUS: u16 = 403;

/// Status code reported when rate-limit retries are exhausted
pub const RATE_LIMITED_STATUS: u16 = 429;

/// Errors surfaced by the request pipeline
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    /// The server answered with a non-2xx status (other than an exhausted 429)
    #[error("{message}")]
    Http {
        /// HTTP status code of the response
        status: u16,
        /// `message` from the error body, or the status text
        message: String,
        /// `code` from the error body, if the server provided one
        server_code: Option<String>,
        /// `details` from the error body, if the server provided one
        details: Option<Value>,
    },

    /// The client-side deadline elapsed before a response was read
    #[error("Request timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// Deadline that was exceeded
        timeout: Duration,
    },

    /// The server kept answering 429 after all local retries
    #[error("Too many requests, please try again later")]
    RateLimited {
        /// Last `Retry-After` hint received, in whole seconds
        retry_after_seconds: Option<u64>,
    },

    /// A state-changing request had no anti-forgery token in production
    #[error("CSRF token is missing; refusing to send state-changing request")]
    CsrfTokenMissing,

    /// Fallback for transport and decoding failures
    #[error("{message}")]
    Unknown {
        /// Human-readable description
        message: String,
    },
}

impl ApiError {
    /// Builds an [`ApiError::Unknown`] from anything displayable
    pub fn unknown(message: impl Into<String>) -> Self {
        ApiError::Unknown {
            message: message.into(),
        }
    }

    /// Builds an [`ApiError::Http`] from a status and an optional decoded body.
    ///
    /// Structured fields (`message`, `code`, `details`) are read defensively:
    /// anything missing or of the wrong type falls back to `status_text`.
    pub fn from_response_body(status: u16, status_text: &str, body: Option<&Value>) -> Self {
        let object = body.and_then(Value::as_object);

        let message = object
            .and_then(|o| o.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                if status_text.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    status_text.to_string()
                }
            });

        let server_code = object
            .and_then(|o| o.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let details = object
            .and_then(|o| o.get("details"))
            .filter(|d| !d.is_null())
            .cloned();

        ApiError::Http {
            status,
            message,
            server_code,
            details,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> String {
        match self {
            ApiError::Http { status, .. } => format!("HTTP_{}", status),
            ApiError::Timeout { .. } => "TIMEOUT".to_string(),
            ApiError::RateLimited { .. } => "RATE_LIMITED".to_string(),
            ApiError::CsrfTokenMissing => "CSRF_TOKEN_MISSING".to_string(),
            ApiError::Unknown { .. } => "UNKNOWN".to_string(),
        }
    }

    /// Human-readable message, safe to show to end users and audit sinks
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// HTTP-equivalent status code, when one applies
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Timeout { .. } => Some(TIMEOUT_STATUS),
            ApiError::RateLimited { .. } => Some(RATE_LIMITED_STATUS),
            ApiError::CsrfTokenMissing => Some(CSRF_MISSING_STATUS),
            ApiError::Unknown { .. } => None,
        }
    }

    /// Extra structured information for higher layers
    ///
    /// For [`ApiError::RateLimited`] this is `{"retryAfterSeconds": n}` so a
    /// caching layer can schedule its own retry.
    pub fn details(&self) -> Option<Value> {
        match self {
            ApiError::Http { details, .. } => details.clone(),
            ApiError::RateLimited {
                retry_after_seconds,
            } => Some(json!({ "retryAfterSeconds": retry_after_seconds })),
            _ => None,
        }
    }

    /// Returns the server's `Retry-After` hint carried by a rate-limit error
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            ApiError::RateLimited {
                retry_after_seconds,
            } => *retry_after_seconds,
            _ => None,
        }
    }

    /// Returns true if this error is an exhausted rate limit
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }

    /// Returns true for 5xx server errors
    pub fn is_server_error(&self) -> bool {
        matches!(self, ApiError::Http { status, .. } if *status >= 500)
    }

    /// Serializes the error into its flat wire shape:
    /// `{ code, message, statusCode?, details? }`
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("code".into(), Value::String(self.code()));
        map.insert("message".into(), Value::String(self.message()));
        if let Some(status) = self.status_code() {
            map.insert("statusCode".into(), json!(status));
        }
        if let Some(details) = self.details() {
            map.insert("details".into(), details);
        }
        Value::Object(map)
    }
}

/// Fatal configuration errors raised while resolving the backend base URL
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No base URL configured in a production deployment
    #[error("API base URL is not configured (required in production)")]
    MissingBaseUrl,

    /// The configured value is not a valid absolute URL
    #[error("Invalid API base URL '{value}': {reason}")]
    InvalidBaseUrl {
        /// The configured value
        value: String,
        /// Why parsing failed
        reason: String,
    },

    /// Production deployments must talk HTTPS
    #[error("API base URL must use https in production, got '{scheme}'")]
    InsecureScheme {
        /// Scheme of the configured URL
        scheme: String,
    },

    /// Production deployments must not target loopback or private networks
    #[error("API base URL host '{host}' is an internal address, not allowed in production")]
    InternalHost {
        /// Offending host
        host: String,
    },
}
