//! Identity provider port (driven/secondary port)
//!
//! The identity provider owns the actual sign-in protocol (authorization
//! code, redirect and popup flows, its own token cache). This crate only
//! needs two entry points from it: a silent acquisition that succeeds
//! without user interaction when possible, and an interactive fallback.
//!
//! ## Design Notes
//!
//! - Uses [`IdentityError`] (cloneable) rather than `anyhow::Error` because
//!   a single acquisition result is shared with every concurrent waiter.
//! - Uses `#[async_trait]` for async trait methods.

use thiserror::Error;

use crate::domain::{Account, Credential};

/// Errors reported by an identity provider
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// No account is signed in, so silent acquisition cannot proceed
    #[error("No active account")]
    NoActiveAccount,

    /// The provider needs the user to interact (consent, MFA, expired session)
    #[error("Interaction required: {0}")]
    InteractionRequired(String),

    /// The user dismissed or cancelled the interactive prompt
    #[error("Sign-in cancelled by user")]
    Cancelled,

    /// Interactive acquisition is not possible in this environment
    #[error("Interactive sign-in unavailable: {0}")]
    InteractiveUnavailable(String),

    /// Any other provider failure
    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// Port trait for the identity provider
#[async_trait::async_trait]
pub trait IIdentityProvider: Send + Sync {
    /// Returns the currently signed-in account, if any
    fn active_account(&self) -> Option<Account>;

    /// Acquires a credential without user interaction
    ///
    /// # Arguments
    /// * `scopes` - Permission scopes the token must carry
    /// * `account` - Account to acquire for (from [`active_account`](Self::active_account))
    async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: Option<&Account>,
    ) -> Result<Credential, IdentityError>;

    /// Acquires a credential by prompting the user
    ///
    /// Only called after silent acquisition failed.
    async fn acquire_token_interactive(&self, scopes: &[String])
        -> Result<Credential, IdentityError>;
}
