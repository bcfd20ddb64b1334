//! Config command - View and check Carelink configuration
//!
//! Provides the `carelink config` CLI command which:
//! 1. Shows the effective configuration (file plus environment overrides)
//! 2. Validates the configuration file and reports errors
//! 3. Resolves the backend base URL the way the client would

use std::path::Path;

use anyhow::{Context, Result};
use carelink_core::config::{
    production_violation, resolve_base_url, ClientConfig, ValidationError, DEFAULT_LOCAL_BASE_URL,
};
use clap::Subcommand;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Resolve the backend base URL for the configured deployment
    Resolve,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(
        &self,
        config_path: &Path,
        config: &ClientConfig,
        format: OutputFormat,
    ) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(config_path, config, format),
            ConfigCommand::Validate => self.execute_validate(config_path, format),
            ConfigCommand::Resolve => self.execute_resolve(config, format),
        }
    }

    fn execute_show(
        &self,
        config_path: &Path,
        config: &ClientConfig,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format.is_json());

        info!(config_path = %config_path.display(), "Showing configuration");

        if format.is_json() {
            let json = serde_json::to_value(config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(config)
                .context("Failed to serialize configuration to YAML")?;

            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    fn execute_validate(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());

        // Load the file explicitly so parse errors are reported, not defaulted
        let mut config = if config_path.exists() {
            match ClientConfig::load(config_path) {
                Ok(config) => config,
                Err(e) => {
                    report_errors(
                        formatter.as_ref(),
                        format,
                        config_path,
                        &[format!("Failed to parse configuration: {}", e)],
                    );
                    anyhow::bail!("Configuration is invalid");
                }
            }
        } else {
            formatter.info(&format!(
                "Configuration file not found at {}; checking defaults",
                config_path.display()
            ));
            ClientConfig::default()
        };

        info!(config_path = %config_path.display(), "Validating configuration");

        let errors = match config.apply_env() {
            Ok(()) => config.validate(),
            Err(e) => vec![e],
        };

        if errors.is_empty() {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": true,
                    "config_path": config_path.display().to_string(),
                    "deployment": config.deployment.to_string(),
                    "errors": [],
                }));
            } else {
                formatter.success("Configuration is valid");
                formatter.info(&format!("File: {}", config_path.display()));
                formatter.info(&format!("Deployment: {}", config.deployment));
            }
            return Ok(());
        }

        report_errors(
            formatter.as_ref(),
            format,
            config_path,
            &describe(&errors),
        );
        anyhow::bail!(
            "Configuration has {} error{}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        )
    }

    fn execute_resolve(&self, config: &ClientConfig, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());

        match resolve_base_url(config.api.base_url.as_deref(), config.deployment) {
            Ok(url) => {
                for warning in resolve_warnings(config, &url) {
                    formatter.warn(&warning);
                }
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": true,
                        "base_url": url.as_str(),
                        "deployment": config.deployment.to_string(),
                    }));
                } else {
                    formatter.success(&format!("Base URL: {}", url));
                    formatter.info(&format!("Deployment: {}", config.deployment));
                }
                Ok(())
            }
            Err(e) => {
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": false,
                        "deployment": config.deployment.to_string(),
                        "error": {"code": "CONFIGURATION_ERROR", "message": e.to_string()},
                    }));
                } else {
                    formatter.error(&e.to_string());
                    formatter.info(&format!("Deployment: {}", config.deployment));
                }
                anyhow::bail!("Base URL cannot be resolved")
            }
        }
    }
}

/// Warnings for a URL resolved outside production that production would refuse
fn resolve_warnings(config: &ClientConfig, url: &url::Url) -> Vec<String> {
    let mut warnings = Vec::new();
    let is_missing = config
        .api
        .base_url
        .as_deref()
        .map(|v| v.trim().is_empty())
        .unwrap_or(true);
    if is_missing {
        warnings.push(format!(
            "No base URL configured; using {}",
            DEFAULT_LOCAL_BASE_URL
        ));
    }
    if let Some(violation) = production_violation(url) {
        warnings.push(format!("Rejected in production: {}", violation));
    }
    warnings
}

fn describe(errors: &[ValidationError]) -> Vec<String> {
    errors.iter().map(|e| e.to_string()).collect()
}

fn report_errors(
    formatter: &dyn crate::output::OutputFormatter,
    format: OutputFormat,
    config_path: &Path,
    errors: &[String],
) {
    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "valid": false,
            "config_path": config_path.display().to_string(),
            "errors": errors,
        }));
        return;
    }

    formatter.error(&format!(
        "Configuration has {} error{}:",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" }
    ));
    formatter.info(&format!("File: {}", config_path.display()));
    formatter.info("");
    for error in errors {
        formatter.info(&format!("  {}", error));
    }
}
