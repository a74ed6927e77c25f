use crate::core::workflow_graph::capability::http::HttpEndpoints;
use crate::core::workflow_graph::operators::retry::RetryPolicy;
use crate::core::workflow_graph::pipeline::PipelineSettings;
use crate::core::workflow_graph::trace::TraceSettings;
use crate::core::workflow_graph::webhook::WebhookSettings;
use crate::logging::config::LoggingSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod loader;

pub use loader::ConfigLoader;

/// Main SeeCats configuration loaded from seecats.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SeeCatsConfig {
    /// Containers, topic and target label bound into the pipeline
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Execution trace configuration
    #[serde(default)]
    pub trace: TraceSettings,

    /// Capability endpoints
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,

    /// Trigger intake listener
    #[serde(default)]
    pub webhook: WebhookSettings,

    /// Console, file and OTLP sinks
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Global execution deadline in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Root directory for execution records and logs
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Persist execution records under state_dir
    #[serde(default = "default_persist_executions")]
    pub persist_executions: bool,
}

/// Capability client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilitiesConfig {
    #[serde(default = "default_classification_endpoint")]
    pub classification_endpoint: String,

    #[serde(default = "default_notification_endpoint")]
    pub notification_endpoint: String,

    #[serde(default = "default_artifact_endpoint")]
    pub artifact_endpoint: String,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Bounded retry around capability calls; a single attempt by default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default)]
    pub backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f32,

    #[serde(default)]
    pub jitter_ms: u64,
}

// Default functions
fn default_timeout_seconds() -> u64 {
    300
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".seecats")
}

fn default_persist_executions() -> bool {
    true
}

fn default_classification_endpoint() -> String {
    "http://127.0.0.1:9100/v1/labels".to_string()
}

fn default_notification_endpoint() -> String {
    "http://127.0.0.1:9100/v1/notifications".to_string()
}

fn default_artifact_endpoint() -> String {
    "http://127.0.0.1:9100/v1/collages".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_max_attempts() -> usize {
    1
}

fn default_backoff_multiplier() -> f32 {
    2.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            timeout_seconds: default_timeout_seconds(),
            state_dir: default_state_dir(),
            persist_executions: default_persist_executions(),
        }
    }
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        CapabilitiesConfig {
            classification_endpoint: default_classification_endpoint(),
            notification_endpoint: default_notification_endpoint(),
            artifact_endpoint: default_artifact_endpoint(),
            request_timeout_seconds: default_request_timeout_seconds(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: default_max_attempts(),
            backoff_ms: 0,
            backoff_multiplier: default_backoff_multiplier(),
            jitter_ms: 0,
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl CapabilitiesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Parsed endpoints; `None` when any endpoint is not a valid URL.
    pub fn endpoints(&self) -> Option<HttpEndpoints> {
        Some(HttpEndpoints {
            classification: self.classification_endpoint.parse().ok()?,
            notification: self.notification_endpoint.parse().ok()?,
            artifact: self.artifact_endpoint.parse().ok()?,
        })
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_ms: self.backoff_ms,
            backoff_multiplier: self.backoff_multiplier,
            jitter_ms: self.jitter_ms,
        }
    }
}
