//! Environment-backed identity provider
//!
//! A terminal has no sign-in surface, so the CLI takes an already issued
//! access token from `CARELINK_ACCESS_TOKEN` (and optionally its expiry from
//! `CARELINK_ACCESS_TOKEN_EXPIRES_ON`, RFC 3339). Interactive acquisition is
//! reported as unavailable.

use async_trait::async_trait;
use carelink_core::domain::{Account, Credential};
use carelink_core::ports::{IIdentityProvider, IdentityError};
use chrono::{DateTime, Utc};
use tracing::warn;

pub const ENV_ACCESS_TOKEN: &str = "CARELINK_ACCESS_TOKEN";
pub const ENV_ACCESS_TOKEN_EXPIRES_ON: &str = "CARELINK_ACCESS_TOKEN_EXPIRES_ON";

/// Account id reported while a token is present
const ENV_ACCOUNT_ID: &str = "environment";

pub struct EnvIdentityProvider {
    credential: Option<Credential>,
}

impl EnvIdentityProvider {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let credential = lookup(ENV_ACCESS_TOKEN)
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .map(|token| match lookup(ENV_ACCESS_TOKEN_EXPIRES_ON) {
                Some(raw) => match DateTime::parse_from_rfc3339(raw.trim()) {
                    Ok(expires_on) => Credential::new(token, expires_on.with_timezone(&Utc)),
                    Err(e) => {
                        warn!(error = %e, "Ignoring unparseable token expiry");
                        Credential::without_expiry(token)
                    }
                },
                None => Credential::without_expiry(token),
            });
        Self { credential }
    }
}

#[async_trait]
impl IIdentityProvider for EnvIdentityProvider {
    fn active_account(&self) -> Option<Account> {
        self.credential
            .as_ref()
            .map(|_| Account::new(ENV_ACCOUNT_ID))
    }

    async fn acquire_token_silent(
        &self,
        _scopes: &[String],
        _account: Option<&Account>,
    ) -> Result<Credential, IdentityError> {
        self.credential
            .clone()
            .ok_or(IdentityError::NoActiveAccount)
    }

    async fn acquire_token_interactive(
        &self,
        _scopes: &[String],
    ) -> Result<Credential, IdentityError> {
        Err(IdentityError::InteractiveUnavailable(format!(
            "set {} to authenticate from the command line",
            ENV_ACCESS_TOKEN
        )))
    }
}
