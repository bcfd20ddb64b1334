//! Integration tests for carelink-http
//!
//! Uses wiremock to simulate the backend API and verifies end-to-end
//! behavior of the ApiClient pipeline: credentials, CSRF, timeouts and
//! rate-limit retries.

mod common;

mod test_credentials;
mod test_csrf;
mod test_pipeline;
mod test_rate_limit;
mod test_timeout;
