//! Backend base URL resolution and validation
//!
//! Resolution is deliberately lazy: [`BaseUrl`] validates the configured
//! value on first use rather than at construction, so a misconfigured
//! deployment surfaces as a [`ConfigError`] the host can render instead of a
//! crash during startup. The first successful result is cached for the
//! lifetime of the owning client.
//!
//! Rules, in order:
//! 1. Missing value: error in production, [`DEFAULT_LOCAL_BASE_URL`] (with a
//!    warning) otherwise.
//! 2. The value must parse as an absolute URL with a host.
//! 3. Production only: `https` is required and internal hosts (loopback,
//!    unspecified, `.local`, RFC 1918, link-local, IPv6 unique-local) are
//!    rejected. Other modes accept such URLs with a warning.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

use tracing::{debug, warn};
use url::{Host, Url};

use super::DeploymentMode;
use crate::domain::ConfigError;

/// Fallback used outside production when no base URL is configured
pub const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:5000";

/// Resolves and validates the configured base URL.
///
/// Emits a warning when falling back to [`DEFAULT_LOCAL_BASE_URL`], and
/// outside production whenever the URL would be rejected in production.
pub fn resolve_base_url(configured: Option<&str>, mode: DeploymentMode) -> Result<Url, ConfigError> {
    let is_missing = configured.map(|v| v.trim().is_empty()).unwrap_or(true);
    let url = check_base_url(configured, mode)?;
    if is_missing {
        warn!(
            fallback = DEFAULT_LOCAL_BASE_URL,
            deployment = %mode,
            "API base URL not configured, falling back to local default"
        );
    }
    if let Some(violation) = production_violation(&url) {
        warn!(
            base_url = %url,
            deployment = %mode,
            reason = %violation,
            "API base URL would be rejected in production"
        );
    }
    debug!(base_url = %url, deployment = %mode, "Resolved API base URL");
    Ok(url)
}

/// Same rules as [`resolve_base_url`] without logging; used by config validation.
pub(crate) fn check_base_url(
    configured: Option<&str>,
    mode: DeploymentMode,
) -> Result<Url, ConfigError> {
    let raw = match configured.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => raw,
        None if mode.is_production() => return Err(ConfigError::MissingBaseUrl),
        None => DEFAULT_LOCAL_BASE_URL,
    };

    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl {
        value: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.host().is_none() {
        return Err(ConfigError::InvalidBaseUrl {
            value: raw.to_string(),
            reason: "URL has no host".to_string(),
        });
    }

    if mode.is_production() {
        if let Some(violation) = production_violation(&url) {
            return Err(violation);
        }
    }

    Ok(url)
}

/// The production rule `url` breaks, if any: a non-`https` scheme first,
/// then an internal host.
pub fn production_violation(url: &Url) -> Option<ConfigError> {
    if url.scheme() != "https" {
        return Some(ConfigError::InsecureScheme {
            scheme: url.scheme().to_string(),
        });
    }
    match url.host() {
        Some(host) if is_internal_host(&host) => Some(ConfigError::InternalHost {
            host: host.to_string(),
        }),
        _ => None,
    }
}

/// Returns true for hosts that must never be targeted from production
fn is_internal_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost"
                || domain.ends_with(".localhost")
                || domain == "local"
                || domain.ends_with(".local")
        }
        Host::Ipv4(addr) => is_internal_ipv4(addr),
        Host::Ipv6(addr) => is_internal_ipv6(addr),
    }
}

fn is_internal_ipv4(addr: &Ipv4Addr) -> bool {
    addr.is_loopback() || addr.is_unspecified() || addr.is_private() || addr.is_link_local()
}

fn is_internal_ipv6(addr: &Ipv6Addr) -> bool {
    if let Some(v4) = addr.to_ipv4_mapped() {
        return is_internal_ipv4(&v4);
    }
    let first = addr.segments()[0];
    addr.is_loopback()
        || addr.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}

/// Lazily resolved, cached base URL owned by a client instance
#[derive(Debug)]
pub struct BaseUrl {
    configured: Option<String>,
    mode: DeploymentMode,
    resolved: OnceLock<Url>,
}

impl BaseUrl {
    /// Captures the configured value without validating it yet
    pub fn new(configured: Option<String>, mode: DeploymentMode) -> Self {
        Self {
            configured,
            mode,
            resolved: OnceLock::new(),
        }
    }

    /// Returns the resolved URL, validating it on first call.
    ///
    /// Failures are not cached; a later call re-runs validation.
    pub fn get(&self) -> Result<&Url, ConfigError> {
        if let Some(url) = self.resolved.get() {
            return Ok(url);
        }
        let url = resolve_base_url(self.configured.as_deref(), self.mode)?;
        Ok(self.resolved.get_or_init(|| url))
    }

    /// Deployment mode the URL is validated against
    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }
}
