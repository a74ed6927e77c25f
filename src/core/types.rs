use serde::{Deserialize, Serialize};

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Trigger payload (or a referenced context field) is missing an expected field.
    MalformedInputError,
    /// An external capability call failed or returned an unusable response.
    CapabilityInvocationError,
    /// The global execution deadline passed.
    TimeoutError,
    /// The workflow graph failed validation before an execution was created.
    DefinitionError,
    ValidationError,
    SerializationError,
    IoError,
    InternalError,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::MalformedInputError => "MalformedInputError",
            ErrorCategory::CapabilityInvocationError => "CapabilityInvocationError",
            ErrorCategory::TimeoutError => "TimeoutError",
            ErrorCategory::DefinitionError => "DefinitionError",
            ErrorCategory::ValidationError => "ValidationError",
            ErrorCategory::SerializationError => "SerializationError",
            ErrorCategory::IoError => "IoError",
            ErrorCategory::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error severity enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Error,
    Warning,
    Info,
    Debug,
}
