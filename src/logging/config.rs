#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::filter::Directive;
use url::Url;

/// `[logging]` section of `seecats.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    /// Console sink; the run mode decides when unset.
    #[serde(default)]
    pub console: Option<ConsoleOutput>,
    #[serde(default)]
    pub format: Option<LogFormat>,
    #[serde(default)]
    pub file: FileSinkSettings,
    #[serde(default)]
    pub otlp: OtlpSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSinkSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Absolute, `~/`-prefixed, or relative to the state directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub rotation: LogRotation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtlpSettings {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

/// Where console logs go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleOutput {
    Stdout,
    Stderr,
    None,
}

/// Console line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Daily,
    Hourly,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_service_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console: None,
            format: None,
            file: FileSinkSettings::default(),
            otlp: OtlpSettings::default(),
        }
    }
}

impl Default for FileSinkSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            rotation: LogRotation::Never,
        }
    }
}

impl Default for OtlpSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            service_name: default_service_name(),
        }
    }
}

impl fmt::Display for ConsoleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConsoleOutput::Stdout => "stdout",
            ConsoleOutput::Stderr => "stderr",
            ConsoleOutput::None => "none",
        })
    }
}

impl FromStr for ConsoleOutput {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(ConsoleOutput::Stdout),
            "stderr" => Ok(ConsoleOutput::Stderr),
            "none" => Ok(ConsoleOutput::None),
            other => Err(format!(
                "unknown console output '{}' (expected stdout, stderr or none)",
                other
            )),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected text or json)", other)),
        }
    }
}

impl LoggingSettings {
    /// `SEECATS_LOG_LEVEL`, `SEECATS_LOG_CONSOLE`, `SEECATS_LOG_FORMAT` and the
    /// standard `OTEL_EXPORTER_OTLP_ENDPOINT` / `OTEL_SERVICE_NAME`.
    pub fn apply_env_overrides(&mut self) -> Result<(), AppError> {
        if let Some(level) = non_empty_var("SEECATS_LOG_LEVEL") {
            self.level = level;
        }
        if let Some(console) = non_empty_var("SEECATS_LOG_CONSOLE") {
            self.console = Some(console.parse().map_err(invalid)?);
        }
        if let Some(format) = non_empty_var("SEECATS_LOG_FORMAT") {
            self.format = Some(format.parse().map_err(invalid)?);
        }
        if let Some(endpoint) = non_empty_var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            self.otlp.endpoint = Some(endpoint);
        }
        if let Some(service_name) = non_empty_var("OTEL_SERVICE_NAME") {
            self.otlp.service_name = service_name;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        for directive in self.level.split(',').filter(|d| !d.trim().is_empty()) {
            Directive::from_str(directive.trim()).map_err(|err| {
                invalid(format!(
                    "logging.level '{}' is not a valid filter directive: {}",
                    self.level, err
                ))
            })?;
        }
        if let Some(endpoint) = &self.otlp.endpoint {
            let url = Url::parse(endpoint)
                .map_err(|err| invalid(format!("logging.otlp.endpoint is invalid: {}", err)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid("logging.otlp.endpoint must use http or https"));
            }
            if self.otlp.service_name.trim().is_empty() {
                return Err(invalid("logging.otlp.service_name cannot be empty"));
            }
        }
        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::new(ErrorCategory::ValidationError, message.into())
}
