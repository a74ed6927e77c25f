#![allow(clippy::result_large_err)]

use super::SeeCatsConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::schema::MAX_TIMEOUT_SECONDS;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "seecats.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from `path` (or `./seecats.toml`), apply environment
    /// overrides and validate. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<SeeCatsConfig, AppError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = Self::load_from_file(&path)?.unwrap_or_default();

        Self::apply_env_overrides(&mut config)?;
        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<SeeCatsConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: SeeCatsConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
        })?;

        Ok(Some(config))
    }

    /// Apply environment variable overrides to the configuration
    /// Environment variables take precedence over config file values
    pub fn apply_env_overrides(config: &mut SeeCatsConfig) -> Result<(), AppError> {
        if let Ok(value) = env::var("SEECATS_INPUT_CONTAINER") {
            config.pipeline.input_container = value;
        }

        if let Ok(value) = env::var("SEECATS_OUTPUT_CONTAINER") {
            config.pipeline.output_container = value;
        }

        if let Ok(value) = env::var("SEECATS_NOTIFICATION_TOPIC") {
            config.pipeline.notification_topic = value;
        }

        if let Ok(value) = env::var("SEECATS_TARGET_LABEL") {
            config.pipeline.target_label = value;
        }

        if let Ok(value) = env::var("SEECATS_TIMEOUT_SECONDS") {
            config.engine.timeout_seconds = value.trim().parse::<u64>().map_err(|_| {
                AppError::new(
                    ErrorCategory::ValidationError,
                    format!("SEECATS_TIMEOUT_SECONDS must be a whole number, got '{}'", value),
                )
            })?;
        }

        if let Ok(value) = env::var("SEECATS_STATE_DIR") {
            config.engine.state_dir = PathBuf::from(value);
        }

        if let Ok(value) = env::var("SEECATS_CLASSIFICATION_ENDPOINT") {
            config.capabilities.classification_endpoint = value;
        }

        if let Ok(value) = env::var("SEECATS_NOTIFICATION_ENDPOINT") {
            config.capabilities.notification_endpoint = value;
        }

        if let Ok(value) = env::var("SEECATS_ARTIFACT_ENDPOINT") {
            config.capabilities.artifact_endpoint = value;
        }

        config.logging.apply_env_overrides()?;

        Ok(())
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "SEECATS_INPUT_CONTAINER - Container watched for new images (default: seecats-inputs)",
            "SEECATS_OUTPUT_CONTAINER - Container receiving collages (default: seecats-output)",
            "SEECATS_NOTIFICATION_TOPIC - Topic for match/no-match messages (default: seecats-notifications)",
            "SEECATS_TARGET_LABEL - Label the pipeline looks for (default: Cat)",
            "SEECATS_TIMEOUT_SECONDS - Global execution deadline in seconds (default: 300)",
            "SEECATS_STATE_DIR - Directory for execution records and logs (default: .seecats)",
            "SEECATS_CLASSIFICATION_ENDPOINT - Classification capability URL",
            "SEECATS_NOTIFICATION_ENDPOINT - Notification capability URL",
            "SEECATS_ARTIFACT_ENDPOINT - Collage generation capability URL",
            "SEECATS_LOG_LEVEL - Filter directive used when RUST_LOG is unset (default: info)",
            "SEECATS_LOG_CONSOLE - Console sink: stdout, stderr or none",
            "SEECATS_LOG_FORMAT - Console format: text or json",
            "SEECATS_HEADLESS - Set to 1 to silence the console sink",
            "OTEL_EXPORTER_OTLP_ENDPOINT - Export spans to this OTLP collector",
        ]
    }

    /// Validate configuration values
    pub fn validate_config(config: &SeeCatsConfig) -> Result<(), AppError> {
        let required = [
            ("pipeline.input_container", &config.pipeline.input_container),
            ("pipeline.output_container", &config.pipeline.output_container),
            ("pipeline.notification_topic", &config.pipeline.notification_topic),
            ("pipeline.target_label", &config.pipeline.target_label),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(invalid(format!("{} cannot be empty", field)));
            }
        }

        if config.engine.timeout_seconds == 0 {
            return Err(invalid("engine.timeout_seconds must be at least 1"));
        }
        if config.engine.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(invalid(format!(
                "engine.timeout_seconds must be at most {}",
                MAX_TIMEOUT_SECONDS
            )));
        }

        if config.engine.state_dir.as_os_str().is_empty() {
            return Err(invalid("engine.state_dir cannot be empty"));
        }

        if config.capabilities.retry.max_attempts == 0 {
            return Err(invalid("capabilities.retry.max_attempts must be at least 1"));
        }

        let endpoints = [
            (
                "capabilities.classification_endpoint",
                &config.capabilities.classification_endpoint,
            ),
            (
                "capabilities.notification_endpoint",
                &config.capabilities.notification_endpoint,
            ),
            (
                "capabilities.artifact_endpoint",
                &config.capabilities.artifact_endpoint,
            ),
        ];
        for (field, value) in endpoints {
            if let Err(err) = url::Url::parse(value) {
                return Err(invalid(format!(
                    "{} is not a valid URL ({}): {}",
                    field, value, err
                )));
            }
        }

        config.logging.validate()?;

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::new(ErrorCategory::ValidationError, message.into())
}
