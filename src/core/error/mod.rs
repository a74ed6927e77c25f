use crate::core::types::{ErrorCategory, ErrorSeverity};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

const CONTEXT_KEY: &str = "context";
const STATE_KEY: &str = "state";

/// Error carried through definition loading, execution and the CLI.
///
/// `code` is a stable identifier (`SC-INPUT-001`, `SC-CAP-001`, ...) when one
/// is assigned and a random `ERR-<uuid>` otherwise. `context` holds free-form
/// key/value detail; the `state` key records where an execution failed.
#[derive(Debug)]
pub struct AppError {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub code: String,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
    pub source: Option<anyhow::Error>,
}

impl AppError {
    pub fn new<T: Into<String>>(category: ErrorCategory, message: T) -> Self {
        Self::build(
            category,
            format!("ERR-{}", uuid::Uuid::new_v4()),
            message.into(),
            None,
        )
    }

    pub fn with_source<T: Into<String>>(
        category: ErrorCategory,
        message: T,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        let mut error = Self::new(category, message);
        error.source = Some(anyhow::anyhow!(source));
        error
    }

    fn build(
        category: ErrorCategory,
        code: String,
        message: String,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            category,
            severity: ErrorSeverity::Error,
            code,
            message,
            context: BTreeMap::new(),
            occurred_at: Utc::now(),
            source,
        }
    }

    fn converted<E>(category: ErrorCategory, code: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let message = err.to_string();
        Self::build(category, code.to_string(), message, Some(err.into()))
    }

    /// Free-form detail, e.g. the reference path that failed to resolve.
    pub fn with_context<T: Into<String>>(mut self, context: T) -> Self {
        self.context.insert(CONTEXT_KEY.into(), context.into());
        self
    }

    pub fn with_code<T: Into<String>>(mut self, code: T) -> Self {
        self.code = code.into();
        self
    }

    pub fn at_state<T: Into<String>>(mut self, state_id: T) -> Self {
        self.context.insert(STATE_KEY.into(), state_id.into());
        self
    }

    pub fn state_id(&self) -> Option<&str> {
        self.context.get(STATE_KEY).map(String::as_str)
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    pub fn add_context(&mut self, key: &str, value: &str) {
        self.context.insert(key.into(), value.into());
    }

    /// `AppError` is not `Clone` because of `source`; the copy drops it.
    pub fn duplicate(&self) -> Self {
        Self {
            context: self.context.clone(),
            code: self.code.clone(),
            message: self.message.clone(),
            source: None,
            ..*self
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.category, self.message)?;
        let mut entries = self.context.iter();
        if let Some((key, value)) = entries.next() {
            write!(f, " (Context: {}={}", key, value)?;
            for (key, value) in entries {
                write!(f, ", {}={}", key, value)?;
            }
            f.write_str(")")?;
        }
        match &self.source {
            Some(source) => write!(f, "\nCaused by: {}", source),
            None => Ok(()),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::build(
            ErrorCategory::InternalError,
            "ANYHOW_ERROR".into(),
            err.to_string(),
            Some(err),
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::converted(ErrorCategory::IoError, "IO_ERROR", err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::converted(ErrorCategory::SerializationError, "SERDE_ERROR", err)
    }
}
