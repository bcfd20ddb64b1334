//! Retry eligibility and backoff delays for throttled requests
//!
//! Everything here is stateless: a [`RetryPlan`] is recomputed for every
//! attempt from the attempt index, the response status and the server's
//! optional `Retry-After` hint.
//!
//! ## Delay formula
//!
//! - With a positive server hint: `min(hint + jitter(hint * 0.2), 30s)`
//! - Otherwise: `min(1s * 2^attempt + jitter(that * 0.2), 30s)`
//!
//! where `jitter(x)` is uniform in `[0, x)`, spreading retries from many
//! clients so they do not arrive in lockstep.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use carelink_http::backoff::{parse_retry_after, BackoffPolicy};
//!
//! let policy = BackoffPolicy::default();
//! let hint = parse_retry_after("5");
//! let delay = policy.compute_delay(0, hint);
//! assert!(delay >= Duration::from_secs(5) && delay < Duration::from_secs(6));
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use reqwest::{header::HeaderMap, StatusCode};
use tracing::{debug, info, warn};

use crate::ClientError;

/// Base delay for exponential backoff
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on any single retry delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Jitter added on top of the nominal delay, as a fraction of it
pub const DEFAULT_JITTER_RATIO: f64 = 0.2;

/// Local 429 retries performed by the request pipeline
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay used by [`retry_rate_limited`] when the error carries no hint
const FALLBACK_TIER_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// BackoffPolicy
// ============================================================================

/// Parameters of the jittered exponential backoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry when the server gives no hint
    pub base: Duration,
    /// Cap applied after jitter
    pub max_delay: Duration,
    /// Maximum jitter as a fraction of the nominal delay
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_ratio: DEFAULT_JITTER_RATIO,
        }
    }
}

impl BackoffPolicy {
    /// Delay before `attempt` is retried, before jitter and capping
    ///
    /// A positive `retry_after` hint takes precedence over the exponential
    /// formula; a zero hint counts as absent.
    pub fn nominal_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after.filter(|hint| !hint.is_zero()) {
            Some(hint) => hint,
            None => {
                // 2^62 seconds is already far past any cap
                let factor = 2f64.powi(attempt.min(62) as i32);
                Duration::from_secs_f64((self.base.as_secs_f64() * factor).min(u32::MAX as f64))
            }
        }
    }

    /// Jittered, capped delay using the thread-local RNG
    pub fn compute_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        self.compute_delay_with_rng(attempt, retry_after, &mut rand::thread_rng())
    }

    /// Jittered, capped delay using the given RNG
    pub fn compute_delay_with_rng<R: Rng + ?Sized>(
        &self,
        attempt: u32,
        retry_after: Option<Duration>,
        rng: &mut R,
    ) -> Duration {
        let nominal = self.nominal_delay(attempt, retry_after).as_secs_f64();
        let spread = nominal * self.jitter_ratio;
        let jitter = if spread > 0.0 {
            rng.gen_range(0.0..spread)
        } else {
            0.0
        };
        Duration::from_secs_f64((nominal + jitter).min(self.max_delay.as_secs_f64()))
    }
}

/// [`BackoffPolicy::compute_delay`] with the default policy
pub fn compute_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    BackoffPolicy::default().compute_delay(attempt, retry_after)
}

// ============================================================================
// Retry eligibility
// ============================================================================

/// True only for HTTP 429 while `attempt < max_retries`
pub fn should_retry(status: StatusCode, attempt: u32, max_retries: u32) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS && attempt < max_retries
}

/// Outcome of evaluating one failed attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPlan {
    pub should_retry: bool,
    pub delay: Duration,
}

impl RetryPlan {
    /// Decides whether `attempt` (0-based) is retried and after how long
    pub fn evaluate(
        policy: &BackoffPolicy,
        status: StatusCode,
        attempt: u32,
        max_retries: u32,
        retry_after: Option<Duration>,
    ) -> Self {
        if should_retry(status, attempt, max_retries) {
            RetryPlan {
                should_retry: true,
                delay: policy.compute_delay(attempt, retry_after),
            }
        } else {
            RetryPlan {
                should_retry: false,
                delay: Duration::ZERO,
            }
        }
    }
}

// ============================================================================
// Retry-After header parsing
// ============================================================================

/// Parses a Retry-After header value into a Duration.
///
/// The header can be either:
/// - An integer number of seconds (e.g., "30")
/// - An HTTP-date (e.g., "Wed, 21 Oct 2015 07:28:00 GMT"), converted to the
///   time remaining from now; dates in the past yield zero
///
/// Returns `None` for anything else.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let remaining = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        return Some(remaining.to_std().unwrap_or(Duration::ZERO));
    }

    debug!(value, "Ignoring unparseable Retry-After header");
    None
}

/// Reads and parses the `Retry-After` header, if present
pub fn retry_after_from_headers(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

// ============================================================================
// Second retry tier for callers
// ============================================================================

/// Re-runs `op` when it fails with an exhausted rate limit.
///
/// This is the small outer tier a caching or data-access layer may stack on
/// top of the pipeline's own retries: up to `extra_attempts` further calls,
/// each after the error's `retry_after_seconds` (or one second). Any other
/// error is returned immediately.
pub async fn retry_rate_limited<T, F, Fut>(extra_attempts: u32, mut op: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(ClientError::Api(err)) if err.is_rate_limited() && attempt < extra_attempts => {
                let delay = err
                    .retry_after_seconds()
                    .filter(|s| *s > 0)
                    .map(Duration::from_secs)
                    .unwrap_or(FALLBACK_TIER_DELAY)
                    .min(DEFAULT_MAX_DELAY);
                attempt += 1;
                info!(
                    attempt,
                    extra_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limit exhausted, retrying from outer tier"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if attempt > 0 {
                    warn!(attempt, code = %err.code(), "Outer retry tier giving up");
                }
                return Err(err);
            }
            ok => return ok,
        }
    }
}
