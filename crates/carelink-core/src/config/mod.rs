//! Configuration module for Carelink.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, environment overrides, validation, defaults, and a builder
//! pattern for programmatic use. Base URL resolution lives in [`base_url`].

pub mod base_url;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use base_url::{production_violation, resolve_base_url, BaseUrl, DEFAULT_LOCAL_BASE_URL};

/// Environment variable overriding `api.base_url`
pub const ENV_BASE_URL: &str = "CARELINK_API_BASE_URL";

/// Environment variable overriding `deployment`
pub const ENV_DEPLOYMENT: &str = "CARELINK_DEPLOYMENT";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Deployment mode supplied by the hosting environment.
///
/// Production enables the strict checks: HTTPS-only public base URLs and
/// mandatory anti-forgery tokens on state-changing requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Production,
    #[default]
    Development,
    Test,
}

impl DeploymentMode {
    pub fn is_production(self) -> bool {
        matches!(self, DeploymentMode::Production)
    }
}

impl std::str::FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(DeploymentMode::Production),
            "development" | "dev" => Ok(DeploymentMode::Development),
            "test" => Ok(DeploymentMode::Test),
            other => Err(format!(
                "invalid deployment mode '{}'; valid options: production, development, test",
                other
            )),
        }
    }
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentMode::Production => write!(f, "production"),
            DeploymentMode::Development => write!(f, "development"),
            DeploymentMode::Test => write!(f, "test"),
        }
    }
}

/// Top-level configuration for Carelink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub deployment: DeploymentMode,
    pub logging: LoggingConfig,
}

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend base URL. `None` falls back to a local default outside production.
    pub base_url: Option<String>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Local retries for HTTP 429 responses.
    pub max_retries: u32,
}

/// Credential acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Scopes requested when the caller does not name any.
    pub scopes: Vec<String>,
    /// Seconds before expiry at which a credential is proactively renewed.
    pub renewal_margin_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON-formatted log lines instead of human-readable ones.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl ClientConfig {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`ClientConfig::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/carelink/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("carelink")
            .join("config.yaml")
    }

    /// Apply overrides from the process environment.
    ///
    /// See [`ENV_BASE_URL`] and [`ENV_DEPLOYMENT`].
    pub fn apply_env(&mut self) -> Result<(), ValidationError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` as the environment.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = Some(url);
        }
        if let Some(mode) = lookup(ENV_DEPLOYMENT).filter(|v| !v.trim().is_empty()) {
            self.deployment = mode.parse().map_err(|message| ValidationError {
                field: "deployment".into(),
                message,
            })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 30_000,
            max_retries: 3,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            scopes: Vec::new(),
            renewal_margin_secs: 300,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"api.timeout_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for `api.max_retries`; beyond this the 30s delay cap dominates.
const MAX_RETRIES_LIMIT: u32 = 10;

/// Upper bound for `auth.renewal_margin_secs` (one day).
const MAX_RENEWAL_MARGIN_SECS: u64 = 24 * 60 * 60;

impl ClientConfig {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. The base URL is
    /// checked with the same rules the client applies at first use.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- api ---
        if let Err(e) = base_url::check_base_url(self.api.base_url.as_deref(), self.deployment) {
            errors.push(ValidationError {
                field: "api.base_url".into(),
                message: e.to_string(),
            });
        }
        if self.api.timeout_ms == 0 {
            errors.push(ValidationError {
                field: "api.timeout_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.api.max_retries > MAX_RETRIES_LIMIT {
            errors.push(ValidationError {
                field: "api.max_retries".into(),
                message: format!("must be at most {}", MAX_RETRIES_LIMIT),
            });
        }

        // --- auth ---
        if self.auth.scopes.iter().any(|s| s.trim().is_empty()) {
            errors.push(ValidationError {
                field: "auth.scopes".into(),
                message: "scopes must not be empty strings".into(),
            });
        }
        if self.auth.renewal_margin_secs > MAX_RENEWAL_MARGIN_SECS {
            errors.push(ValidationError {
                field: "auth.renewal_margin_secs".into(),
                message: format!("must be at most {}", MAX_RENEWAL_MARGIN_SECS),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ClientConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`ClientConfig`] programmatically.
///
/// Starts from [`ClientConfig::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use carelink_core::config::{ClientConfigBuilder, DeploymentMode};
///
/// let config = ClientConfigBuilder::new()
///     .base_url("https://api.example.org")
///     .deployment(DeploymentMode::Production)
///     .timeout_ms(10_000)
///     .build();
/// assert!(config.validate().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder initialised with [`ClientConfig::default`] values.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = Some(url.into());
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.api.timeout_ms = ms;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.api.max_retries = n;
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.auth.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn renewal_margin_secs(mut self, secs: u64) -> Self {
        self.config.auth.renewal_margin_secs = secs;
        self
    }

    pub fn deployment(mut self, mode: DeploymentMode) -> Self {
        self.config.deployment = mode;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    /// Consume the builder and return the final [`ClientConfig`].
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
