//! Bearer credentials and identity-provider accounts
//!
//! A [`Credential`] is produced by the identity provider and held only in
//! memory. Renewals supersede it with a fresh value; it is never mutated.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A short-lived bearer credential
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque bearer token presented in the `Authorization` header
    pub access_token: String,
    /// When the token stops being accepted (`None` if the provider did not say)
    pub expires_on: Option<DateTime<Utc>>,
}

impl Credential {
    /// Creates a credential with a known expiry
    pub fn new(access_token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_on: Some(expires_on),
        }
    }

    /// Creates a credential whose lifetime is unknown
    pub fn without_expiry(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_on: None,
        }
    }

    /// Returns true if the token has expired at `now`
    ///
    /// Credentials without an expiry are never considered expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_on.map(|exp| now >= exp).unwrap_or(false)
    }

    /// Returns true if the token is still usable at `now` with `margin` to spare
    ///
    /// Credentials without an expiry are never considered fresh, so callers
    /// go back to the identity provider for them. A margin reaching past the
    /// representable range counts as not fresh.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.renewal_instant(margin)
            .map(|renew_at| now < renew_at)
            .unwrap_or(false)
    }

    /// Time from `now` until the renewal instant `expires_on - margin`
    ///
    /// Returns `None` when there is no expiry or the renewal instant is not
    /// in the future, so stale tokens never schedule a renewal.
    pub fn renewal_delay(&self, now: DateTime<Utc>, margin: Duration) -> Option<Duration> {
        let renew_at = self.renewal_instant(margin)?;
        if renew_at <= now {
            return None;
        }
        (renew_at - now).to_std().ok()
    }

    /// `expires_on - margin`, or `None` without an expiry or on overflow
    fn renewal_instant(&self, margin: Duration) -> Option<DateTime<Utc>> {
        let margin = chrono::Duration::from_std(margin).ok()?;
        self.expires_on?.checked_sub_signed(margin)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// The identity provider's currently signed-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Provider-specific account identifier
    pub id: String,
    /// Sign-in name, when known
    pub username: Option<String>,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}
