//! Request command - Send a single request through the API pipeline
//!
//! Provides the `carelink request` CLI command which:
//! 1. Builds request options from the command-line flags
//! 2. Authenticates with the token from the environment
//! 3. Prints the decoded response body or the classified error

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use carelink_core::config::ClientConfig;
use carelink_http::{ApiClient, Method, RequestOptions};
use clap::Args;
use serde_json::Value;
use tracing::{debug, info};

use crate::identity::EnvIdentityProvider;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct RequestCommand {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: String,

    /// Endpoint path appended to the base URL (e.g. /patients/42)
    pub endpoint: String,

    /// Query parameter as key=value (repeatable)
    #[arg(short = 'q', long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// JSON request body
    #[arg(short = 'd', long = "data", value_name = "JSON")]
    pub data: Option<String>,

    /// Send without an Authorization header
    #[arg(long)]
    pub anonymous: bool,

    /// Fail on the first 429 instead of retrying
    #[arg(long)]
    pub no_retry: bool,

    /// Per-request timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Anti-forgery token for state-changing requests
    #[arg(long, env = "CARELINK_CSRF_TOKEN", value_name = "TOKEN")]
    pub csrf_token: Option<String>,
}

impl RequestCommand {
    /// Execute the request command
    pub async fn execute(&self, config: &ClientConfig, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());

        let method = parse_method(&self.method)?;
        let options = self.build_options()?;

        let client = ApiClient::new(config)
            .with_identity_provider(Arc::new(EnvIdentityProvider::from_env()));
        if let Some(token) = &self.csrf_token {
            client.csrf_store().set(token.as_str());
        }

        info!(%method, endpoint = %self.endpoint, "Sending request");

        let result = client
            .request::<Value>(method, &self.endpoint, options)
            .await;
        client.shutdown();

        match result {
            Ok(body) => {
                debug!("Request succeeded");
                formatter.body(&body);
                Ok(())
            }
            Err(e) => {
                formatter.request_failed(&e);
                anyhow::bail!("Request failed with {}", e.code())
            }
        }
    }

    fn build_options(&self) -> Result<RequestOptions> {
        let mut options = RequestOptions::new();

        for pair in &self.query {
            let (key, value) = parse_key_value(pair)?;
            options = options.query(key, value);
        }
        if let Some(data) = &self.data {
            let body: Value =
                serde_json::from_str(data).context("--data must be valid JSON")?;
            options = options.body(body);
        }
        if self.anonymous {
            options = options.anonymous();
        }
        if self.no_retry {
            options = options.skip_rate_limit_retry();
        }
        if let Some(ms) = self.timeout_ms {
            anyhow::ensure!(ms > 0, "--timeout-ms must be greater than 0");
            options = options.timeout(Duration::from_millis(ms));
        }

        Ok(options)
    }
}

fn parse_method(raw: &str) -> Result<Method> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: '{}'", raw))
}

/// Splits `key=value`; the value may itself contain `=`
fn parse_key_value(pair: &str) -> Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => anyhow::bail!("Expected KEY=VALUE, got '{}'", pair),
    }
}
