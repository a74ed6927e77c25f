//! Contracts of the external collaborators invoked by Task states.
//!
//! The engine never talks to a provider directly: operators hold one of the
//! capability traits below and translate between resolved Task parameters and
//! these request types.

pub mod http;

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request sent to the classification capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub container: String,
    pub key: String,
    /// Only labels in this set are returned.
    #[serde(default)]
    pub label_filter: Vec<String>,
}

/// Detected label, ordered by the provider (first = highest priority).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<LabelInstance>,
}

impl Label {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
            instances: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelInstance {
    pub bounding_box: BoundingBox,
    pub confidence: f64,
}

/// Ratios of the overall image size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub topic: String,
    pub message: String,
}

/// Both containers are bound at definition time; no per-event parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRequest {
    pub source_container: String,
    pub destination_container: String,
}

/// Failure reported by a capability client.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("Network error calling {endpoint}: {message}")]
    Network { endpoint: String, message: String },
    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("Invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },
    #[error("Capability rejected the request: {0}")]
    Rejected(String),
}

impl CapabilityError {
    /// Map into the engine's error model (`CapabilityInvocationError`).
    pub fn into_app_error(self, operation: &str) -> AppError {
        let code = match self {
            CapabilityError::InvalidResponse { .. } => "SC-CAP-002",
            _ => "SC-CAP-001",
        };
        AppError::new(
            ErrorCategory::CapabilityInvocationError,
            format!("{} failed: {}", operation, self),
        )
        .with_code(code)
    }
}

#[async_trait]
pub trait ClassificationCapability: Send + Sync {
    async fn detect_labels(
        &self,
        request: ClassificationRequest,
    ) -> Result<Vec<Label>, CapabilityError>;
}

#[async_trait]
pub trait NotificationCapability: Send + Sync {
    async fn publish(&self, request: NotificationRequest) -> Result<(), CapabilityError>;
}

#[async_trait]
pub trait ArtifactCapability: Send + Sync {
    async fn generate(&self, request: ArtifactRequest) -> Result<(), CapabilityError>;
}

/// The set of capability endpoints granted to an engine.
#[derive(Clone)]
pub struct Capabilities {
    pub classification: Arc<dyn ClassificationCapability>,
    pub notification: Arc<dyn NotificationCapability>,
    pub artifact: Arc<dyn ArtifactCapability>,
}
