//! Credential lifecycle management
//!
//! [`CredentialManager`] owns everything about bearer credentials on the
//! client side:
//!
//! - **Caching** - the last credential is reused while it is more than the
//!   renewal margin away from expiry.
//! - **Single-flight** - at most one acquisition runs at a time. Callers that
//!   arrive while it is in progress await the same shared handle and observe
//!   the identical token or error. The handle is cleared as soon as the
//!   acquisition settles, so a failure is never replayed to later callers.
//! - **Silent then interactive** - acquisition first asks the identity
//!   provider silently for the active account and falls back to a single
//!   interactive attempt.
//! - **Proactive renewal** - after each success a timer is armed for
//!   `expires_on - margin` (default five minutes). Only one timer exists at a
//!   time; it is aborted on reschedule, [`CredentialManager::clear`],
//!   [`CredentialManager::shutdown`] and when the last manager handle drops.
//!
//! Acquisitions run in their own spawned task, so a caller that gives up
//! (timeout, cancellation) never strands the in-flight handle.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use carelink_core::domain::Credential;
use carelink_core::ports::{IIdentityProvider, IdentityError};
use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default time before expiry at which credentials are renewed
pub const DEFAULT_RENEWAL_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Errors returned by [`CredentialManager::get_credential`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Both silent and interactive acquisition failed
    #[error("Credential acquisition failed (silent: {silent}; interactive: {interactive})")]
    Acquisition {
        silent: IdentityError,
        interactive: IdentityError,
    },

    /// The acquisition task panicked or was cancelled
    #[error("Credential acquisition task ended unexpectedly: {0}")]
    TaskFailed(String),
}

type AcquisitionResult = Result<Credential, CredentialError>;

/// The shared, awaitable handle of an in-flight acquisition
type RefreshOperation = Shared<BoxFuture<'static, AcquisitionResult>>;

/// Mutable state, only ever locked for short synchronous sections
#[derive(Default)]
struct State {
    /// `Some` while an acquisition is in progress
    in_flight: Option<RefreshOperation>,
    /// Last acquired credential and the scopes it was acquired for
    cached: Option<(Vec<String>, Credential)>,
    /// Pending renewal timer, tagged so a firing timer can detach only itself
    renewal: Option<(u64, JoinHandle<()>)>,
    next_renewal_id: u64,
}

struct Inner {
    provider: Arc<dyn IIdentityProvider>,
    default_scopes: Vec<String>,
    renewal_margin: Duration,
    state: Mutex<State>,
}

/// Acquires, caches and proactively renews bearer credentials
///
/// Cloning is cheap and yields a handle to the same manager.
#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("default_scopes", &self.inner.default_scopes)
            .field("renewal_margin", &self.inner.renewal_margin)
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

impl CredentialManager {
    /// Creates a manager for `provider` requesting `default_scopes`
    pub fn new(provider: Arc<dyn IIdentityProvider>, default_scopes: Vec<String>) -> Self {
        Self::with_renewal_margin(provider, default_scopes, DEFAULT_RENEWAL_MARGIN)
    }

    /// Creates a manager that renews `renewal_margin` before expiry
    pub fn with_renewal_margin(
        provider: Arc<dyn IIdentityProvider>,
        default_scopes: Vec<String>,
        renewal_margin: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                default_scopes,
                renewal_margin,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Returns a bearer token for `scopes` (or the default scopes)
    ///
    /// Serves from cache while the cached credential is fresh; otherwise
    /// joins the in-flight acquisition or starts one.
    ///
    /// Only one acquisition runs at a time regardless of scopes: a caller
    /// that joins an acquisition started for other scopes receives that
    /// acquisition's token.
    pub async fn get_credential(&self, scopes: Option<&[String]>) -> Result<String, CredentialError> {
        let scopes = scopes
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| self.inner.default_scopes.clone());

        let operation = {
            let mut state = self.inner.state();
            if let Some((cached_scopes, credential)) = &state.cached {
                if *cached_scopes == scopes
                    && credential.is_fresh_at(Utc::now(), self.inner.renewal_margin)
                {
                    return Ok(credential.access_token.clone());
                }
            }
            Inner::join_or_start(&self.inner, &mut state, scopes)
        };

        operation.await.map(|credential| credential.access_token)
    }

    /// Returns the last acquired credential, if any, without contacting the provider
    pub fn current_credential(&self) -> Option<Credential> {
        self.inner
            .state()
            .cached
            .as_ref()
            .map(|(_, credential)| credential.clone())
    }

    /// Returns true while an acquisition is in progress
    pub fn is_refreshing(&self) -> bool {
        self.inner.state().in_flight.is_some()
    }

    /// Returns true if a proactive renewal timer is armed
    pub fn has_pending_renewal(&self) -> bool {
        self.inner
            .state()
            .renewal
            .as_ref()
            .map(|(_, handle)| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Forgets the cached credential and cancels the renewal timer
    ///
    /// Used on sign-out. An acquisition already in flight still settles.
    pub fn clear(&self) {
        let mut state = self.inner.state();
        state.cached = None;
        if let Some((_, handle)) = state.renewal.take() {
            handle.abort();
        }
        info!("Cleared cached credential");
    }

    /// Cancels the renewal timer; the cached credential stays usable
    pub fn shutdown(&self) {
        if let Some((_, handle)) = self.inner.state().renewal.take() {
            handle.abort();
            debug!("Cancelled proactive credential renewal");
        }
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the in-flight operation, starting one if none is running
    fn join_or_start(this: &Arc<Self>, state: &mut State, scopes: Vec<String>) -> RefreshOperation {
        if let Some(operation) = &state.in_flight {
            debug!("Joining in-flight credential acquisition");
            return operation.clone();
        }

        debug!(scopes = ?scopes, "Starting credential acquisition");
        let task_inner = Arc::clone(this);
        // The task cannot settle before `in_flight` is populated: settling
        // needs the state lock, which the caller holds until we return.
        let handle = tokio::spawn(async move {
            let result = task_inner.acquire(&scopes).await;
            task_inner.settle(scopes, &result);
            result
        });

        let operation = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(CredentialError::TaskFailed(e.to_string())))
        }
        .boxed()
        .shared();

        state.in_flight = Some(operation.clone());
        operation
    }

    /// Silent acquisition, then one interactive attempt
    async fn acquire(&self, scopes: &[String]) -> AcquisitionResult {
        let account = self.provider.active_account();

        let silent = match self
            .provider
            .acquire_token_silent(scopes, account.as_ref())
            .await
        {
            Ok(credential) => {
                debug!(expires_on = ?credential.expires_on, "Silent acquisition succeeded");
                return Ok(credential);
            }
            Err(e) => e,
        };

        info!(error = %silent, "Silent acquisition failed, falling back to interactive");

        match self.provider.acquire_token_interactive(scopes).await {
            Ok(credential) => {
                info!(expires_on = ?credential.expires_on, "Interactive acquisition succeeded");
                Ok(credential)
            }
            Err(interactive) => {
                warn!(%silent, %interactive, "Credential acquisition failed");
                Err(CredentialError::Acquisition {
                    silent,
                    interactive,
                })
            }
        }
    }

    /// Clears the in-flight handle and, on success, caches and schedules renewal
    fn settle(self: &Arc<Self>, scopes: Vec<String>, result: &AcquisitionResult) {
        let mut state = self.state();
        state.in_flight = None;

        if let Ok(credential) = result {
            self.schedule_renewal(&mut state, credential);
            state.cached = Some((scopes, credential.clone()));
        }
    }

    /// Replaces any pending renewal timer with one for `credential`
    fn schedule_renewal(self: &Arc<Self>, state: &mut State, credential: &Credential) {
        if let Some((_, previous)) = state.renewal.take() {
            previous.abort();
        }

        let Some(delay) = credential.renewal_delay(Utc::now(), self.renewal_margin) else {
            debug!(
                expires_on = ?credential.expires_on,
                "Credential has no future renewal point, not scheduling renewal"
            );
            return;
        };

        let id = state.next_renewal_id;
        state.next_renewal_id += 1;

        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(renew_after(weak, id, delay));
        state.renewal = Some((id, handle));

        debug!(delay_secs = delay.as_secs(), "Scheduled proactive credential renewal");
    }
}

/// Timer body: waits, then re-acquires for the default scopes
async fn renew_after(weak: Weak<Inner>, id: u64, delay: Duration) {
    tokio::time::sleep(delay).await;

    let Some(inner) = weak.upgrade() else {
        return;
    };

    let operation = {
        let mut state = inner.state();
        // Detach ourselves so the success path's reschedule does not abort
        // the task that is waiting on the result.
        if matches!(state.renewal, Some((current, _)) if current == id) {
            state.renewal = None;
        }
        Inner::join_or_start(&inner, &mut state, inner.default_scopes.clone())
    };
    drop(inner);

    info!("Proactively renewing credential");
    if let Err(e) = operation.await {
        warn!(error = %e, "Proactive credential renewal failed");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some((_, handle)) = state.renewal.take() {
            handle.abort();
        }
    }
}
